//! Insurance coverage / copay calculation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bhyt::validate_card;
use crate::debounce::Debouncer;
use crate::resources::insurance::{CoverageRequest, Insurance, InsuranceRemote, RemoteCoverage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageSource {
    /// No usable insurance; the patient pays everything.
    Uninsured,
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageBreakdown {
    pub total_amount: u64,
    pub coverage_percent: u8,
    pub insurance_pays: u64,
    pub patient_pays: u64,
    pub source: CoverageSource,
}

/// Insurer share of `amount` at `percent`, rounded half-up to whole VND.
pub fn insurer_share(amount: u64, percent: u8) -> u64 {
    let percent = u128::from(percent.min(100));
    ((u128::from(amount) * percent + 50) / 100) as u64
}

/// Explicit percentage on the record wins; otherwise the BHYT prefix default.
/// Inactive records and cards that fail validation cover nothing.
pub fn local_coverage_percent(insurance: &Insurance) -> Option<u8> {
    if !insurance.is_active {
        return None;
    }
    let card = validate_card(&insurance.card_number);
    if !card.valid {
        return None;
    }
    insurance.coverage_percent.map(|p| p.min(100)).or(card.default_coverage)
}

pub fn calculate_with_percent(amount: u64, percent: Option<u8>) -> CoverageBreakdown {
    match percent {
        Some(p) => {
            let p = p.min(100);
            let insurance_pays = insurer_share(amount, p);
            CoverageBreakdown {
                total_amount: amount,
                coverage_percent: p,
                insurance_pays,
                patient_pays: amount - insurance_pays,
                source: CoverageSource::Local,
            }
        }
        None => CoverageBreakdown {
            total_amount: amount,
            coverage_percent: 0,
            insurance_pays: 0,
            patient_pays: amount,
            source: CoverageSource::Uninsured,
        },
    }
}

pub fn calculate_coverage(amount: u64, insurance: Option<&Insurance>) -> CoverageBreakdown {
    calculate_with_percent(amount, insurance.and_then(local_coverage_percent))
}

impl From<RemoteCoverage> for CoverageBreakdown {
    fn from(remote: RemoteCoverage) -> Self {
        CoverageBreakdown {
            total_amount: remote.total_amount,
            coverage_percent: remote.coverage_percent,
            insurance_pays: remote.insurance_pays,
            patient_pays: remote.patient_pays,
            source: CoverageSource::Remote,
        }
    }
}

/* ============================================================
   Live estimate for an amount being typed in
   ============================================================ */

#[derive(Debug, Default)]
struct EstimateState {
    amount: u64,
    remote: Option<CoverageBreakdown>,
}

/// Tracks the amount entered on an invoice form and keeps a coverage
/// breakdown for it: the local figure immediately, the server's figure once
/// a debounced pricing request for the current amount has come back.
pub struct CoverageEstimator<R: ?Sized> {
    remote: Arc<R>,
    insurance: Option<Insurance>,
    patient_id: Option<Uuid>,
    state: Arc<RwLock<EstimateState>>,
    debouncer: Debouncer,
}

impl<R> CoverageEstimator<R>
where
    R: InsuranceRemote + ?Sized + 'static,
{
    pub fn new(remote: Arc<R>, insurance: Option<Insurance>, debounce: Duration) -> Self {
        let patient_id = insurance.as_ref().map(|i| i.patient_id);
        Self {
            remote,
            insurance,
            patient_id,
            state: Arc::new(RwLock::new(EstimateState::default())),
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn set_amount(&self, amount: u64) {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.amount = amount;
            if state.remote.as_ref().is_some_and(|r| r.total_amount != amount) {
                state.remote = None;
            }
        }

        let Some(insurance) = self
            .insurance
            .as_ref()
            .filter(|i| local_coverage_percent(i).is_some())
        else {
            self.debouncer.cancel();
            return;
        };

        let req = CoverageRequest {
            amount,
            patient_id: self.patient_id,
            card_number: Some(insurance.card_number.clone()),
            service_codes: Vec::new(),
        };
        let remote = self.remote.clone();
        let state = self.state.clone();

        self.debouncer.call(async move {
            match remote.calculate_coverage(&req).await {
                Ok(result) => {
                    let mut state = state.write().unwrap_or_else(|e| e.into_inner());
                    // A newer amount may have been typed while the request was in flight
                    if state.amount == req.amount && result.total_amount == req.amount {
                        debug!(amount = req.amount, percent = result.coverage_percent, "remote coverage resolved");
                        state.remote = Some(result.into());
                    }
                }
                Err(e) => {
                    warn!(code = e.code(), error = %e, amount = req.amount, "remote coverage failed, keeping local estimate");
                }
            }
        });
    }

    pub fn amount(&self) -> u64 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).amount
    }

    pub fn breakdown(&self) -> CoverageBreakdown {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        match &state.remote {
            Some(remote) if remote.total_amount == state.amount => remote.clone(),
            _ => calculate_coverage(state.amount, self.insurance.as_ref()),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.debouncer.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::resources::insurance::RemoteCardCheck;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn insurance(card: &str, explicit: Option<u8>) -> Insurance {
        Insurance {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            card_number: card.to_string(),
            prefix_code: card.get(..2).map(str::to_string),
            coverage_percent: explicit,
            registered_facility_code: None,
            registered_facility_name: None,
            valid_from: None,
            valid_to: None,
            is_primary: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_eighty_percent_of_a_million() {
        let b = calculate_with_percent(1_000_000, Some(80));
        assert_eq!(b.insurance_pays, 800_000);
        assert_eq!(b.patient_pays, 200_000);
    }

    #[test]
    fn test_full_coverage_and_uninsured() {
        let full = calculate_with_percent(450_000, Some(100));
        assert_eq!(full.patient_pays, 0);
        assert_eq!(full.insurance_pays, 450_000);

        let none = calculate_coverage(450_000, None);
        assert_eq!(none.insurance_pays, 0);
        assert_eq!(none.patient_pays, 450_000);
        assert_eq!(none.source, CoverageSource::Uninsured);
    }

    #[test]
    fn test_round_half_up_on_insurer_share() {
        // 15 * 95 / 100 = 14.25 -> 14
        assert_eq!(insurer_share(15, 95), 14);
        // 10 * 95 / 100 = 9.5 -> 10
        assert_eq!(insurer_share(10, 95), 10);
        // 1 * 50 / 100 = 0.5 -> 1
        assert_eq!(insurer_share(1, 50), 1);
        let b = calculate_with_percent(10, Some(95));
        assert_eq!(b.insurance_pays + b.patient_pays, 10);
    }

    #[test]
    fn test_percent_is_clamped() {
        let b = calculate_with_percent(1_000, Some(150));
        assert_eq!(b.coverage_percent, 100);
        assert_eq!(b.patient_pays, 0);
    }

    #[test]
    fn test_prefix_default_and_explicit_override() {
        let dn = insurance("DN4-0123-45678-90123", None);
        assert_eq!(calculate_coverage(1_000_000, Some(&dn)).insurance_pays, 800_000);

        let facility = insurance("DN4-0123-45678-90123", Some(90));
        assert_eq!(calculate_coverage(1_000_000, Some(&facility)).insurance_pays, 900_000);

        let mut inactive = insurance("HN1-0123-45678-90123", None);
        inactive.is_active = false;
        assert_eq!(calculate_coverage(1_000_000, Some(&inactive)).patient_pays, 1_000_000);
    }

    #[test]
    fn test_invalid_card_covers_nothing() {
        for card in ["DN-garbage", "dn4-0123-45678-90123", "ZZ4-0123-45678-90123"] {
            let b = calculate_coverage(1_000_000, Some(&insurance(card, None)));
            assert_eq!(b.insurance_pays, 0, "{card}");
            assert_eq!(b.patient_pays, 1_000_000, "{card}");
            assert_eq!(b.source, CoverageSource::Uninsured, "{card}");
        }

        // An explicit percentage does not rescue a malformed card
        let b = calculate_coverage(1_000_000, Some(&insurance("DN-garbage", Some(80))));
        assert_eq!(b.insurance_pays, 0);
    }

    struct FakePricing {
        percent: Option<u8>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InsuranceRemote for FakePricing {
        async fn validate_card(&self, _card_number: &str) -> Result<RemoteCardCheck, ApiError> {
            Ok(RemoteCardCheck::default())
        }

        async fn calculate_coverage(&self, req: &CoverageRequest) -> Result<RemoteCoverage, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let percent = self
                .percent
                .ok_or_else(|| ApiError::from_response(reqwest::StatusCode::INTERNAL_SERVER_ERROR, ""))?;
            let insurance_pays = insurer_share(req.amount, percent);
            Ok(RemoteCoverage {
                total_amount: req.amount,
                coverage_percent: percent,
                insurance_pays,
                patient_pays: req.amount - insurance_pays,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_estimator_prefers_remote_once_resolved() {
        let remote = Arc::new(FakePricing {
            percent: Some(90),
            calls: AtomicUsize::new(0),
        });
        let est = CoverageEstimator::new(
            remote.clone(),
            Some(insurance("DN4-0123-45678-90123", None)),
            Duration::from_millis(300),
        );

        est.set_amount(100_000);
        est.set_amount(1_000_000);
        // Before the debounce elapses the local default applies
        assert_eq!(est.breakdown().insurance_pays, 800_000);
        assert_eq!(est.breakdown().source, CoverageSource::Local);

        tokio::time::sleep(Duration::from_millis(350)).await;
        let b = est.breakdown();
        assert_eq!(b.source, CoverageSource::Remote);
        assert_eq!(b.insurance_pays, 900_000);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);

        // Changing the amount drops the stale remote figure immediately
        est.set_amount(2_000_000);
        assert_eq!(est.breakdown().source, CoverageSource::Local);
        assert_eq!(est.breakdown().insurance_pays, 1_600_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_estimator_falls_back_on_remote_error() {
        let remote = Arc::new(FakePricing {
            percent: None,
            calls: AtomicUsize::new(0),
        });
        let est = CoverageEstimator::new(
            remote.clone(),
            Some(insurance("HT3-1111-22222-33333", None)),
            Duration::from_millis(300),
        );
        est.set_amount(200_000);
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        let b = est.breakdown();
        assert_eq!(b.source, CoverageSource::Local);
        assert_eq!(b.insurance_pays, 190_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uninsured_never_calls_remote() {
        let remote = Arc::new(FakePricing {
            percent: Some(100),
            calls: AtomicUsize::new(0),
        });
        let est = CoverageEstimator::new(remote.clone(), None, Duration::from_millis(300));
        est.set_amount(300_000);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
        assert_eq!(est.breakdown().patient_pays, 300_000);
    }
}
