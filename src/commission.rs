use crate::classifier::Classification;

/// Private (self-paying) patients; every other company string is an insurer.
pub const PARTICULAR: &str = "PARTICULAR";

/// Outpatient consultation codes exempt from commission: consultations are
/// settled through the consulting-room ledger, not this one. Pending written
/// confirmation from billing staff.
pub const CONSULT_EXEMPT_CODES: &[&str] = &["50.01.01", "50.01.02"];

/// Clinic/doctor revenue split from the fee schedule.
#[derive(Debug, Clone, Copy)]
pub struct TariffSplit {
    pub clinic_amount: f64,
    pub doctor_amount: f64,
}

impl TariffSplit {
    /// The clinic bills and retains the full service revenue; the doctor is
    /// paid through commission instead of a direct fee.
    fn clinic_retains_all(&self) -> bool {
        self.clinic_amount > 0.0 && self.doctor_amount == 0.0
    }
}

/// Doctor percentages as configured; either may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoctorRates {
    pub commission_pct: Option<f64>,
    pub insurance_pct: Option<f64>,
}

/// Round half-away-from-zero to 2 decimals. `f64::round` rounds half away
/// from zero, so scaling by 100 gives the fixed monetary rule.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn is_exempt(tariff_code: Option<&str>) -> bool {
    tariff_code
        .map(|c| CONSULT_EXEMPT_CODES.contains(&c.trim()))
        .unwrap_or(false)
}

fn standard_commission(amount: f64, rates: &DoctorRates) -> f64 {
    match rates.commission_pct {
        Some(pct) => round2(amount * pct / 100.0),
        None => 0.0,
    }
}

/// Commission decision table. Rules evaluate in order; the first applicable
/// one wins. Pure: callers resolve the tariff split beforehand.
pub fn commission(
    classification: Classification,
    amount: f64,
    company: Option<&str>,
    tariff_code: Option<&str>,
    tariff: Option<&TariffSplit>,
    rates: &DoctorRates,
    default_insurance_pct: f64,
) -> f64 {
    let company = company.map(str::trim).map(str::to_uppercase);
    let is_particular = company.as_deref() == Some(PARTICULAR);

    match classification {
        // Rule 1: payroll service, non-consultation code. PARTICULAR rows
        // pay commission only when the tariff shows the clinic retaining
        // the full revenue; insurer rows pay unconditionally.
        Classification::Planilla => {
            if is_exempt(tariff_code) {
                return 0.0;
            }
            if is_particular {
                match tariff {
                    Some(t) if t.clinic_retains_all() => standard_commission(amount, rates),
                    _ => 0.0,
                }
            } else {
                standard_commission(amount, rates)
            }
        }
        Classification::Reten => {
            // Rule 2: insurer on-call services pay the on-call percentage.
            if !is_particular {
                let pct = rates.insurance_pct.unwrap_or(default_insurance_pct);
                return round2(amount * pct / 100.0);
            }
            // Rule 3: private on-call. Exempt consultation codes pay zero;
            // otherwise commission only when the clinic retained the full
            // revenue (the doctor billed separately in every other split).
            if is_exempt(tariff_code) {
                return 0.0;
            }
            match tariff {
                Some(t) if t.clinic_retains_all() => standard_commission(amount, rates),
                _ => 0.0,
            }
        }
    }
}
