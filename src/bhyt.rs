//! BHYT (Vietnamese social health insurance) card validation.
//!
//! Card numbers look like `DN4-0123-45678-90123`: a two-letter beneficiary
//! category, the benefit-level digit, then three digit groups. The category
//! prefix decides the default coverage percentage.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Locale, Localized};
use crate::resources::insurance::InsuranceRemote;

static CARD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}\d-\d{4}-\d{5}-\d{5}$").expect("card pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BhytCategory {
    pub code: &'static str,
    pub default_coverage: u8,
    pub label: Localized,
}

const fn cat(code: &'static str, default_coverage: u8, vi: &'static str, en: &'static str) -> BhytCategory {
    BhytCategory {
        code,
        default_coverage,
        label: Localized::new(vi, en),
    }
}

pub static BHYT_CATEGORIES: [BhytCategory; 17] = [
    cat("DN", 80, "Người lao động trong doanh nghiệp", "Enterprise employee"),
    cat("HC", 80, "Cán bộ, công chức, viên chức", "Civil servant"),
    cat("XK", 80, "Cán bộ xã, phường, thị trấn", "Commune official"),
    cat("CH", 80, "Người lao động cơ quan, tổ chức khác", "Other organisation employee"),
    cat("HS", 80, "Học sinh", "Pupil"),
    cat("GD", 80, "Hộ gia đình", "Household member"),
    cat("HT", 95, "Người hưởng lương hưu", "Retiree on pension"),
    cat("TB", 95, "Người hưởng trợ cấp BHXH", "Social insurance allowance recipient"),
    cat("CN", 95, "Hộ cận nghèo", "Near-poor household"),
    cat("CC", 100, "Người có công với cách mạng", "Person with meritorious service"),
    cat("CK", 100, "Thân nhân người có công", "Relative of meritorious person"),
    cat("CA", 100, "Công an nhân dân", "People's police"),
    cat("QN", 100, "Quân nhân", "Military personnel"),
    cat("TE", 100, "Trẻ em dưới 6 tuổi", "Child under six"),
    cat("HN", 100, "Hộ nghèo", "Poor household"),
    cat("DT", 100, "Người dân tộc thiểu số vùng khó khăn", "Ethnic minority in hardship area"),
    cat("BT", 100, "Người hưởng bảo trợ xã hội", "Social protection beneficiary"),
];

pub fn lookup_category(prefix: &str) -> Option<&'static BhytCategory> {
    BHYT_CATEGORIES.iter().find(|c| c.code == prefix)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardErrorCode {
    InvalidFormat,
    InvalidPrefix,
    Expired,
    Duplicate,
    #[serde(other)]
    Rejected,
}

impl CardErrorCode {
    pub fn message(&self, locale: Locale) -> &'static str {
        let text = match self {
            CardErrorCode::InvalidFormat => Localized::new(
                "Số thẻ BHYT không đúng định dạng (VD: DN4-0123-45678-90123)",
                "BHYT card number has an invalid format (e.g. DN4-0123-45678-90123)",
            ),
            CardErrorCode::InvalidPrefix => Localized::new(
                "Mã đối tượng trên thẻ BHYT không hợp lệ",
                "BHYT beneficiary prefix is not recognised",
            ),
            CardErrorCode::Expired => Localized::new("Thẻ BHYT đã hết hạn", "BHYT card has expired"),
            CardErrorCode::Duplicate => Localized::new(
                "Thẻ BHYT đã được đăng ký cho bệnh nhân khác",
                "BHYT card is already registered to another patient",
            ),
            CardErrorCode::Rejected => Localized::new("Thẻ BHYT bị từ chối", "BHYT card was rejected"),
        };
        text.get(locale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardValidation {
    pub valid: bool,
    pub prefix_code: Option<String>,
    pub default_coverage: Option<u8>,
    pub error_code: Option<CardErrorCode>,
    pub expires_on: Option<NaiveDate>,
    pub source: ValidationSource,
}

impl CardValidation {
    fn invalid(prefix_code: Option<String>, code: CardErrorCode) -> Self {
        Self {
            valid: false,
            prefix_code,
            default_coverage: None,
            error_code: Some(code),
            expires_on: None,
            source: ValidationSource::Local,
        }
    }
}

/// Checks the card number exactly as given; no trimming or case folding.
pub fn validate_card(card_number: &str) -> CardValidation {
    if !CARD_PATTERN.is_match(card_number) {
        return CardValidation::invalid(None, CardErrorCode::InvalidFormat);
    }

    let prefix = &card_number[..2];
    match lookup_category(prefix) {
        Some(category) => CardValidation {
            valid: true,
            prefix_code: Some(prefix.to_string()),
            default_coverage: Some(category.default_coverage),
            error_code: None,
            expires_on: None,
            source: ValidationSource::Local,
        },
        None => CardValidation::invalid(Some(prefix.to_string()), CardErrorCode::InvalidPrefix),
    }
}

/// Local check first; a locally valid card is then checked remotely for
/// expiry and duplicates. When the remote call fails the local result is
/// returned unchanged.
pub async fn validate_card_with_remote<R>(remote: &R, card_number: &str) -> CardValidation
where
    R: InsuranceRemote + ?Sized,
{
    let local = validate_card(card_number);
    if !local.valid {
        return local;
    }

    match remote.validate_card(card_number).await {
        Ok(check) => {
            let error_code = match (check.valid, check.error_code) {
                (true, _) => None,
                (false, Some(code)) => Some(code),
                (false, None) if check.expired => Some(CardErrorCode::Expired),
                (false, None) if check.duplicate => Some(CardErrorCode::Duplicate),
                (false, None) => Some(CardErrorCode::Rejected),
            };
            CardValidation {
                valid: check.valid,
                prefix_code: local.prefix_code,
                default_coverage: check.coverage_percent.or(local.default_coverage),
                error_code,
                expires_on: check.valid_to,
                source: ValidationSource::Remote,
            }
        }
        Err(e) => {
            warn!(code = e.code(), error = %e, "remote BHYT validation failed, using local result");
            local
        }
    }
}
