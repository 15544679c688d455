// src/resources/reports.rs

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    client::{ApiClient, DownloadedFile},
    error::ApiError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Revenue,
    Appointments,
    PatientOutcomes,
    BhytClaims,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Revenue,
        ReportKind::Appointments,
        ReportKind::PatientOutcomes,
        ReportKind::BhytClaims,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ReportKind::Revenue => "revenue",
            ReportKind::Appointments => "appointments",
            ReportKind::PatientOutcomes => "patient-outcomes",
            ReportKind::BhytClaims => "bhyt-claims",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|k| k.slug() == s)
    }
}

#[derive(Serialize)]
struct ExportQuery {
    start_date: NaiveDate,
    end_date: NaiveDate,
    format: &'static str,
}

/// CSV export for the inclusive date range.
pub async fn export_report(
    client: &ApiClient,
    kind: ReportKind,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<DownloadedFile, ApiError> {
    if end_date < start_date {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "end_date must not be before start_date".into(),
        ));
    }
    let slug = kind.slug();
    client
        .download(
            &format!("/v1/reports/{slug}/export"),
            &ExportQuery {
                start_date,
                end_date,
                format: "csv",
            },
            &format!("{slug}-{start_date}-{end_date}.csv"),
        )
        .await
}
