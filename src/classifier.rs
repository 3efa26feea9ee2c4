use crate::models::ScheduleSlot;

/// How a billed service was attended: during the doctor's salaried payroll
/// shift, or on call outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Planilla,
    Reten,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planilla => "planilla",
            Self::Reten => "reten",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planilla" => Some(Self::Planilla),
            "reten" => Some(Self::Reten),
            _ => None,
        }
    }
}

pub struct ClassifierOutcome {
    pub classification: Classification,
    pub schedule_id: Option<i64>,
    pub reason: String,
    pub is_flagged: bool,
}

/// Parse "H:MM" / "HH:MM" / "HH:MM:SS" into minutes since midnight.
/// Seconds are ignored for slot membership.
pub fn minutes_since_midnight(time: &str) -> Option<u32> {
    let mut parts = time.trim().split(':');
    let h: u32 = parts.next()?.parse().ok()?;
    let m: u32 = parts.next()?.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Inclusive membership. A slot whose end precedes its start wraps past
/// midnight: membership holds iff t >= start or t <= end.
fn slot_contains(slot: &ScheduleSlot, t: u32) -> bool {
    let (Some(start), Some(end)) = (
        minutes_since_midnight(&slot.start_time),
        minutes_since_midnight(&slot.end_time),
    ) else {
        return false;
    };
    if end < start {
        t >= start || t <= end
    } else {
        t >= start && t <= end
    }
}

/// Classify one service against the doctor's slots for that date.
///
/// First matching slot in list order wins. A matched payroll slot means
/// PLANILLA, anything else RETEN. `hint_reten` carries the source row's
/// free-text RETEN marker: on a matched slot a disagreement only annotates
/// the reason and flags the row for review; with no matched slot the marker
/// corroborates the fail-safe RETEN and suppresses the flag.
pub fn classify(time: &str, hint_reten: bool, slots: &[ScheduleSlot]) -> ClassifierOutcome {
    let Some(t) = minutes_since_midnight(time) else {
        return ClassifierOutcome {
            classification: Classification::Reten,
            schedule_id: None,
            reason: format!("unparsable time '{time}'"),
            is_flagged: true,
        };
    };

    for slot in slots {
        if !slot_contains(slot, t) {
            continue;
        }
        let window = format!("{}-{}", slot.start_time, slot.end_time);
        if slot.is_payroll {
            let mut reason = format!("within payroll shift {window}");
            let mut flagged = false;
            if hint_reten {
                reason.push_str("; source row marked RETEN");
                flagged = true;
            }
            return ClassifierOutcome {
                classification: Classification::Planilla,
                schedule_id: Some(slot.id),
                reason,
                is_flagged: flagged,
            };
        }
        let mut reason = format!("within on-call shift {window}");
        let mut flagged = false;
        if !hint_reten {
            reason.push_str("; source row not marked RETEN");
            flagged = true;
        }
        return ClassifierOutcome {
            classification: Classification::Reten,
            schedule_id: Some(slot.id),
            reason,
            is_flagged: flagged,
        };
    }

    if hint_reten {
        ClassifierOutcome {
            classification: Classification::Reten,
            schedule_id: None,
            reason: "no schedule match; source row marked RETEN".to_string(),
            is_flagged: false,
        }
    } else {
        ClassifierOutcome {
            classification: Classification::Reten,
            schedule_id: None,
            reason: "no schedule match".to_string(),
            is_flagged: true,
        }
    }
}

/// The source ledger marks on-call rows in free text (`tipoate`, sometimes
/// `area`). Case-insensitive substring match.
pub fn has_reten_hint(attention_type: Option<&str>, area: Option<&str>) -> bool {
    let hit = |s: Option<&str>| {
        s.map(|v| v.to_uppercase().contains("RETEN")).unwrap_or(false)
    };
    hit(attention_type) || hit(area)
}
