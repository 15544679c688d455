// src/resources/claims.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    client::{ApiClient, DownloadedFile},
    error::ApiError,
    models::{ApiResponse, Page},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Draft,
    Submitted,
    Accepted,
    Rejected,
    Paid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiClaim {
    pub id: Uuid,
    pub claim_number: Option<String>,
    pub facility_code: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: ClaimStatus,
    #[serde(default)]
    pub invoice_ids: Vec<Uuid>,
    #[serde(default)]
    pub item_count: u32,
    pub total_amount: u64,
    pub insurance_amount: u64,
    pub rejection_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: Uuid,
    pub claim_number: Option<String>,
    pub facility_code: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: ClaimStatus,
    pub invoice_ids: Vec<Uuid>,
    pub item_count: u32,
    pub total_amount: u64,
    pub insurance_amount: u64,
    pub rejection_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub can_submit: bool,
}

impl From<ApiClaim> for Claim {
    fn from(api: ApiClaim) -> Self {
        // Rejected claims can be corrected and sent again
        let can_submit = matches!(api.status, ClaimStatus::Draft | ClaimStatus::Rejected) && !api.invoice_ids.is_empty();
        Claim {
            id: api.id,
            claim_number: api.claim_number,
            facility_code: api.facility_code,
            period_start: api.period_start,
            period_end: api.period_end,
            status: api.status,
            invoice_ids: api.invoice_ids,
            item_count: api.item_count,
            total_amount: api.total_amount,
            insurance_amount: api.insurance_amount,
            rejection_reason: api.rejection_reason,
            submitted_at: api.submitted_at,
            created_at: api.created_at,
            can_submit,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClaimQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClaimStatus>,
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
pub struct CreateClaimRequest {
    pub invoice_ids: Vec<Uuid>,
    pub facility_code: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Serialize)]
struct NoBody {}

#[derive(Serialize)]
struct NoQuery {}

pub async fn list_claims(client: &ApiClient, query: &ClaimQuery) -> Result<Page<Claim>, ApiError> {
    let resp: ApiResponse<Vec<ApiClaim>> = client.get("/v1/billing/claims", query).await?;
    Ok(Page::from_response(resp))
}

pub async fn get_claim(client: &ApiClient, claim_id: Uuid) -> Result<Claim, ApiError> {
    let resp = client
        .get_plain::<ApiClaim>(&format!("/v1/billing/claims/{claim_id}"))
        .await?;
    Ok(resp.data.into())
}

pub async fn create_claim(client: &ApiClient, req: &CreateClaimRequest) -> Result<Claim, ApiError> {
    if req.invoice_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "a claim needs at least one invoice".into(),
        ));
    }
    if req.period_end < req.period_start {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "period_end must not be before period_start".into(),
        ));
    }
    let resp = client.post::<ApiClaim, _>("/v1/billing/claims", req).await?;
    Ok(resp.data.into())
}

pub async fn submit_claim(client: &ApiClient, claim_id: Uuid) -> Result<Claim, ApiError> {
    let resp = client
        .post::<ApiClaim, _>(&format!("/v1/billing/claims/{claim_id}/submit"), &NoBody {})
        .await?;
    Ok(resp.data.into())
}

/// Downloads the claim as the XML document the social insurance portal accepts.
pub async fn export_claim_xml(client: &ApiClient, claim_id: Uuid) -> Result<DownloadedFile, ApiError> {
    let file = client
        .download(
            &format!("/v1/billing/claims/{claim_id}/export"),
            &NoQuery {},
            &format!("bhyt-claim-{claim_id}.xml"),
        )
        .await?;
    if !file.content_type.contains("xml") {
        warn!(%claim_id, content_type = %file.content_type, "claim export is not XML");
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claim(status: &str, invoices: serde_json::Value) -> Claim {
        serde_json::from_value::<ApiClaim>(json!({
            "id": "4c5d6e7f-8091-4a2b-8c3d-4e5f60718293",
            "facility_code": "79071",
            "period_start": "2026-09-01",
            "period_end": "2026-09-30",
            "status": status,
            "invoice_ids": invoices,
            "total_amount": 2500000,
            "insurance_amount": 2000000,
            "created_at": "2026-10-01T08:00:00Z"
        }))
        .unwrap()
        .into()
    }

    #[test]
    fn test_can_submit() {
        let some = json!(["2b3c4d5e-6f70-4a81-9b2c-3d4e5f607182"]);
        assert!(claim("draft", some.clone()).can_submit);
        assert!(claim("rejected", some.clone()).can_submit);
        assert!(!claim("submitted", some.clone()).can_submit);
        assert!(!claim("draft", json!([])).can_submit);
    }

    #[test]
    fn test_view_shape() {
        let out = serde_json::to_value(claim("accepted", json!([]))).unwrap();
        assert_eq!(out["facilityCode"], "79071");
        assert_eq!(out["periodStart"], "2026-09-01");
        assert_eq!(out["insuranceAmount"], 2000000);
    }
}
