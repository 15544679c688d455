// src/resources/billing.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    client::ApiClient,
    coverage::{CoverageBreakdown, calculate_coverage},
    error::ApiError,
    models::{ApiResponse, Page},
    resources::insurance::Insurance,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    PartiallyPaid,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Momo,
    Vnpay,
    Zalopay,
}

/* ============================================================
   API shape
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiInvoiceItem {
    pub service_code: String,
    pub description: String,
    pub description_vi: Option<String>,
    pub quantity: u32,
    pub unit_price: u64,
    pub amount: u64,
    #[serde(default)]
    pub bhyt_covered: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiInvoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub items: Vec<ApiInvoiceItem>,
    pub subtotal: u64,
    #[serde(default)]
    pub discount_amount: u64,
    #[serde(default)]
    pub insurance_amount: u64,
    pub patient_amount: u64,
    #[serde(default)]
    pub paid_amount: u64,
    pub issued_at: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPayment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub received_by: Option<Uuid>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiService {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub name_vi: Option<String>,
    pub category: Option<String>,
    pub price: u64,
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub bhyt_covered: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/* ============================================================
   View models
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub service_code: String,
    pub description: String,
    pub description_vi: Option<String>,
    pub quantity: u32,
    pub unit_price: u64,
    pub amount: u64,
    pub bhyt_covered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItem>,
    pub subtotal: u64,
    pub discount_amount: u64,
    pub insurance_amount: u64,
    pub patient_amount: u64,
    pub paid_amount: u64,
    pub balance_due: u64,
    pub issued_at: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Total after discount, before insurance.
    pub fn net_amount(&self) -> u64 {
        self.subtotal.saturating_sub(self.discount_amount)
    }

    /// Only BHYT-eligible lines are shared with the insurer.
    pub fn estimate_coverage(&self, insurance: Option<&Insurance>) -> CoverageBreakdown {
        let covered: u64 = self.items.iter().filter(|i| i.bhyt_covered).map(|i| i.amount).sum();
        let mut breakdown = calculate_coverage(covered.min(self.net_amount()), insurance);
        let uncovered = self.net_amount().saturating_sub(breakdown.total_amount);
        breakdown.total_amount += uncovered;
        breakdown.patient_pays += uncovered;
        breakdown
    }

    pub fn is_overdue_on(&self, day: NaiveDate) -> bool {
        self.balance_due > 0
            && !matches!(self.status, InvoiceStatus::Cancelled | InvoiceStatus::Draft)
            && self.due_date.is_some_and(|due| due < day)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub received_by: Option<Uuid>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub name_vi: Option<String>,
    pub category: Option<String>,
    pub price: u64,
    pub duration_minutes: Option<u32>,
    pub bhyt_covered: bool,
    pub is_active: bool,
}

/* ============================================================
   Transformers
   ============================================================ */

impl From<ApiInvoiceItem> for InvoiceItem {
    fn from(api: ApiInvoiceItem) -> Self {
        InvoiceItem {
            service_code: api.service_code,
            description: api.description,
            description_vi: api.description_vi,
            quantity: api.quantity,
            unit_price: api.unit_price,
            amount: api.amount,
            bhyt_covered: api.bhyt_covered,
        }
    }
}

impl From<ApiInvoice> for Invoice {
    fn from(api: ApiInvoice) -> Self {
        Invoice {
            id: api.id,
            invoice_number: api.invoice_number,
            patient_id: api.patient_id,
            appointment_id: api.appointment_id,
            status: api.status,
            items: api.items.into_iter().map(Into::into).collect(),
            subtotal: api.subtotal,
            discount_amount: api.discount_amount,
            insurance_amount: api.insurance_amount,
            patient_amount: api.patient_amount,
            paid_amount: api.paid_amount,
            balance_due: api.patient_amount.saturating_sub(api.paid_amount),
            issued_at: api.issued_at,
            due_date: api.due_date,
            created_at: api.created_at,
        }
    }
}

impl From<ApiPayment> for Payment {
    fn from(api: ApiPayment) -> Self {
        Payment {
            id: api.id,
            invoice_id: api.invoice_id,
            amount: api.amount,
            method: api.method,
            reference: api.reference,
            received_by: api.received_by,
            paid_at: api.paid_at,
        }
    }
}

impl From<ApiService> for Service {
    fn from(api: ApiService) -> Self {
        Service {
            id: api.id,
            code: api.code,
            name: api.name,
            name_vi: api.name_vi,
            category: api.category,
            price: api.price,
            duration_minutes: api.duration_minutes,
            bhyt_covered: api.bhyt_covered,
            is_active: api.is_active,
        }
    }
}

/* ============================================================
   Requests
   ============================================================ */

#[derive(Debug, Clone, Default, Serialize)]
pub struct InvoiceQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InvoiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceItemInput {
    pub service_code: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateInvoiceRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub items: Vec<InvoiceItemInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<u64>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordPaymentRequest {
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

/* ============================================================
   Endpoints
   ============================================================ */

pub async fn list_invoices(client: &ApiClient, query: &InvoiceQuery) -> Result<Page<Invoice>, ApiError> {
    let resp: ApiResponse<Vec<ApiInvoice>> = client.get("/v1/billing/invoices", query).await?;
    Ok(Page::from_response(resp))
}

pub async fn get_invoice(client: &ApiClient, invoice_id: Uuid) -> Result<Invoice, ApiError> {
    let resp = client
        .get_plain::<ApiInvoice>(&format!("/v1/billing/invoices/{invoice_id}"))
        .await?;
    Ok(resp.data.into())
}

pub async fn create_invoice(client: &ApiClient, req: &CreateInvoiceRequest) -> Result<Invoice, ApiError> {
    if req.items.is_empty() || req.items.iter().any(|i| i.quantity == 0) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "an invoice needs at least one item with a positive quantity".into(),
        ));
    }
    let resp = client.post::<ApiInvoice, _>("/v1/billing/invoices", req).await?;
    Ok(resp.data.into())
}

pub async fn record_payment(
    client: &ApiClient,
    invoice_id: Uuid,
    req: &RecordPaymentRequest,
) -> Result<Payment, ApiError> {
    if req.amount == 0 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "payment amount must be positive".into(),
        ));
    }
    let resp = client
        .post::<ApiPayment, _>(&format!("/v1/billing/invoices/{invoice_id}/payments"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn list_payments(client: &ApiClient, invoice_id: Uuid) -> Result<Vec<Payment>, ApiError> {
    let resp = client
        .get_plain::<Vec<ApiPayment>>(&format!("/v1/billing/invoices/{invoice_id}/payments"))
        .await?;
    Ok(resp.data.into_iter().map(Into::into).collect())
}

/// Active services only; the server keeps retired codes for old invoices.
pub async fn list_services(client: &ApiClient) -> Result<Vec<Service>, ApiError> {
    let resp = client.get_plain::<Vec<ApiService>>("/v1/billing/services").await?;
    Ok(resp
        .data
        .into_iter()
        .map(Service::from)
        .filter(|s| s.is_active)
        .collect())
}
