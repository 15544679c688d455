// src/resources/insurance.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    bhyt::{CardErrorCode, validate_card},
    client::ApiClient,
    error::ApiError,
};

/* ============================================================
   API shape
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiInsurance {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub card_number: String,
    pub prefix_code: Option<String>,
    pub coverage_percent: Option<u8>,
    pub registered_facility_code: Option<String>,
    pub registered_facility_name: Option<String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

/* ============================================================
   View model
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insurance {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub card_number: String,
    pub prefix_code: Option<String>,
    pub coverage_percent: Option<u8>,
    pub registered_facility_code: Option<String>,
    pub registered_facility_name: Option<String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ApiInsurance> for Insurance {
    fn from(api: ApiInsurance) -> Self {
        // Older records were stored without the prefix; recover it from a well-formed card number.
        let prefix_code = api
            .prefix_code
            .or_else(|| validate_card(&api.card_number).prefix_code);

        Insurance {
            id: api.id,
            patient_id: api.patient_id,
            card_number: api.card_number,
            prefix_code,
            coverage_percent: api.coverage_percent,
            registered_facility_code: api.registered_facility_code,
            registered_facility_name: api.registered_facility_name,
            valid_from: api.valid_from,
            valid_to: api.valid_to,
            is_primary: api.is_primary,
            is_active: api.is_active,
            created_at: api.created_at,
            updated_at: api.updated_at,
        }
    }
}

impl Insurance {
    pub fn is_expired_on(&self, day: NaiveDate) -> bool {
        self.valid_to.is_some_and(|to| day > to)
    }
}

/* ============================================================
   Requests
   ============================================================ */

#[derive(Debug, Clone, Default, Serialize)]
pub struct SaveInsuranceRequest {
    pub card_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_facility_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<NaiveDate>,
    pub is_primary: bool,
}

/* ============================================================
   Remote validation / pricing
   ============================================================ */

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteCardCheck {
    pub valid: bool,
    #[serde(default)]
    pub prefix_code: Option<String>,
    #[serde(default)]
    pub coverage_percent: Option<u8>,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub duplicate: bool,
    #[serde(default)]
    pub error_code: Option<CardErrorCode>,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageRequest {
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub service_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCoverage {
    pub total_amount: u64,
    pub coverage_percent: u8,
    pub insurance_pays: u64,
    pub patient_pays: u64,
}

#[derive(Serialize)]
struct ValidateCardBody<'a> {
    card_number: &'a str,
}

/// Server-side insurance checks that refine the locally computable defaults.
#[async_trait]
pub trait InsuranceRemote: Send + Sync {
    async fn validate_card(&self, card_number: &str) -> Result<RemoteCardCheck, ApiError>;
    async fn calculate_coverage(&self, req: &CoverageRequest) -> Result<RemoteCoverage, ApiError>;
}

#[async_trait]
impl InsuranceRemote for ApiClient {
    async fn validate_card(&self, card_number: &str) -> Result<RemoteCardCheck, ApiError> {
        let resp = self
            .post::<RemoteCardCheck, _>("/v1/insurance/validate", &ValidateCardBody { card_number })
            .await?;
        Ok(resp.data)
    }

    async fn calculate_coverage(&self, req: &CoverageRequest) -> Result<RemoteCoverage, ApiError> {
        let resp = self
            .post::<RemoteCoverage, _>("/v1/billing/calculate-coverage", req)
            .await?;
        Ok(resp.data)
    }
}

/* ============================================================
   Endpoints
   ============================================================ */

pub async fn get_patient_insurance(client: &ApiClient, patient_id: Uuid) -> Result<Option<Insurance>, ApiError> {
    let resp = client
        .get_plain::<Option<ApiInsurance>>(&format!("/v1/patients/{patient_id}/insurance"))
        .await?;
    Ok(resp.data.map(Insurance::from))
}

pub async fn create_insurance(
    client: &ApiClient,
    patient_id: Uuid,
    req: &SaveInsuranceRequest,
) -> Result<Insurance, ApiError> {
    let resp = client
        .post::<ApiInsurance, _>(&format!("/v1/patients/{patient_id}/insurance"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn update_insurance(
    client: &ApiClient,
    patient_id: Uuid,
    req: &SaveInsuranceRequest,
) -> Result<Insurance, ApiError> {
    let resp = client
        .put::<ApiInsurance, _>(&format!("/v1/patients/{patient_id}/insurance"), req)
        .await?;
    Ok(resp.data.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_json() -> serde_json::Value {
        json!({
            "id": "6f1c1d3e-4a4b-4c1e-9d7a-1f2e3d4c5b6a",
            "patient_id": "0b7e6a52-8e35-4b8f-a1f6-0d9f3b1d2c4e",
            "card_number": "HT3-1111-22222-33333",
            "prefix_code": null,
            "coverage_percent": null,
            "registered_facility_code": "79-001",
            "registered_facility_name": "Bệnh viện Chợ Rẫy",
            "valid_from": "2026-01-01",
            "valid_to": "2026-12-31",
            "created_at": "2026-01-02T03:04:05Z"
        })
    }

    #[test]
    fn test_transform_to_camel_case() {
        let api: ApiInsurance = serde_json::from_value(api_json()).unwrap();
        let view = Insurance::from(api);
        assert_eq!(view.prefix_code.as_deref(), Some("HT"));
        assert!(view.is_active);
        assert!(!view.is_primary);

        let out = serde_json::to_value(&view).unwrap();
        assert_eq!(out["cardNumber"], "HT3-1111-22222-33333");
        assert_eq!(out["registeredFacilityName"], "Bệnh viện Chợ Rẫy");
        assert!(out.get("card_number").is_none());
    }

    #[test]
    fn test_malformed_card_gets_no_prefix() {
        let mut raw = api_json();
        raw["card_number"] = json!("DN-garbage");
        let view = Insurance::from(serde_json::from_value::<ApiInsurance>(raw).unwrap());
        assert_eq!(view.prefix_code, None);
    }

    #[test]
    fn test_expiry() {
        let api: ApiInsurance = serde_json::from_value(api_json()).unwrap();
        let view = Insurance::from(api);
        assert!(!view.is_expired_on(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()));
        assert!(view.is_expired_on(NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()));
    }

    #[test]
    fn test_camel_case_input_is_rejected() {
        let camel = json!({
            "id": "6f1c1d3e-4a4b-4c1e-9d7a-1f2e3d4c5b6a",
            "patientId": "0b7e6a52-8e35-4b8f-a1f6-0d9f3b1d2c4e",
            "cardNumber": "HT3-1111-22222-33333",
            "createdAt": "2026-01-02T03:04:05Z"
        });
        assert!(serde_json::from_value::<ApiInsurance>(camel).is_err());
    }
}
