/// One shift window in a doctor's daily schedule. `end < start` means the
/// shift wraps past midnight.
#[derive(Debug, Clone)]
pub struct ScheduleSlot {
    pub id: i64,
    pub doctor_id: i64,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub is_payroll: bool,
}

/// Intermediate representation from the XLSX/CSV parser before
/// classification and DB insert.
#[derive(Debug, Clone, Default)]
pub struct ServiceRow {
    pub doctor_code: String,
    pub date: String,
    pub time: String,
    pub amount: f64,
    pub service: Option<String>,
    pub description: Option<String>,
    pub patient: Option<String>,
    pub insurance_id: Option<String>,
    pub company: Option<String>,
    pub tariff_code: Option<String>,
    pub receipt: Option<String>,
    pub area: Option<String>,
    pub attention_type: Option<String>,
    pub admission: Option<String>,
}
