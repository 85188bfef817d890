use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, VariantNames};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    /// Never stored; a pending payment past its due date reads as overdue
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, VariantNames)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub child_id: i64,
    pub amount_cents: i64,
    /// Billing month, `YYYY-MM`
    pub period: String,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn effective_status(&self, today: NaiveDate) -> PaymentStatus {
        match self.status {
            PaymentStatus::Pending if self.due_date < today => PaymentStatus::Overdue,
            other => other,
        }
    }

    pub fn with_effective_status(mut self, today: NaiveDate) -> Self {
        self.status = self.effective_status(today);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub child_id: i64,
    pub amount_cents: i64,
    pub period: String,
    pub due_date: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentRequest {
    pub amount_cents: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<PaymentStatus>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayRequest {
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratePaymentsRequest {
    pub period: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
}
