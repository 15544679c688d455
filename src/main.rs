use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use physioflow::{
    ApiClient, Config,
    bhyt::{lookup_category, validate_card, validate_card_with_remote},
    checklist_progress::{Responses, compute_progress, missing_required},
    client::DownloadedFile,
    coverage::calculate_with_percent,
    models::{ListParams, Locale},
    outcomes::{MeasureType, definition},
    resources::{
        checklists::{ApiChecklistTemplate, ChecklistTemplate},
        claims, discharge,
        patients::{self, PatientQuery},
        reports::{self, ReportKind},
    },
};

#[derive(Parser)]
#[command(name = "physioflow", version, about = "PhysioFlow clinic tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a BHYT card number
    ValidateCard {
        card_number: String,
        /// Also ask the server about expiry and duplicates
        #[arg(long)]
        remote: bool,
    },
    /// Split an amount (VND) between insurer and patient
    Coverage {
        amount: u64,
        /// BHYT card; its prefix decides the default percentage
        #[arg(long)]
        card: Option<String>,
        /// Explicit coverage percentage, overrides the card prefix
        #[arg(long)]
        percent: Option<u8>,
    },
    /// Target score one MCID from a baseline
    OutcomeTarget { measure: String, baseline: f64 },
    /// Completion of a checklist from a template file and a responses file
    ChecklistProgress { template: PathBuf, responses: PathBuf },
    /// Download a BHYT claim as XML
    ExportClaim {
        claim_id: Uuid,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Download a patient's discharge summary PDF
    DischargePdf {
        patient_id: Uuid,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Download a CSV report
    ExportReport {
        /// revenue, appointments, patient-outcomes or bhyt-claims
        kind: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// List or search patients
    Patients {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// Offline commands still honour the locale without needing an API url.
fn locale_from_env() -> Locale {
    std::env::var("PHYSIOFLOW_LOCALE")
        .ok()
        .and_then(|s| Locale::parse(&s))
        .unwrap_or_default()
}

fn connect() -> anyhow::Result<(ApiClient, Config)> {
    let cfg = Config::from_env()?;
    let client = ApiClient::new(&cfg)?;
    Ok((client, cfg))
}

fn save(file: &DownloadedFile, dir: &Path) -> anyhow::Result<()> {
    let path = file
        .save_to(dir)
        .with_context(|| format!("writing {} into {}", file.filename, dir.display()))?;
    println!("{} ({} bytes, sha256 {})", path.display(), file.bytes.len(), file.sha256);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::ValidateCard { card_number, remote } => {
            let locale = locale_from_env();
            let result = if remote {
                let (client, _) = connect()?;
                validate_card_with_remote(&client, &card_number).await
            } else {
                validate_card(&card_number)
            };
            print_json(&result)?;
            if let Some(code) = &result.error_code {
                eprintln!("{}", code.message(locale));
            } else if let Some(category) = result.prefix_code.as_deref().and_then(lookup_category) {
                eprintln!("{}", category.label.get(locale));
            }
        }

        Command::Coverage { amount, card, percent } => {
            let percent = match (percent, card.as_deref()) {
                (Some(p), _) => Some(p),
                (None, Some(card)) => {
                    let check = validate_card(card);
                    if let Some(code) = &check.error_code {
                        eprintln!("{}", code.message(locale_from_env()));
                    }
                    check.default_coverage
                }
                (None, None) => None,
            };
            print_json(&calculate_with_percent(amount, percent))?;
        }

        Command::OutcomeTarget { measure, baseline } => {
            let measure = MeasureType::parse(&measure)
                .with_context(|| format!("unknown outcome measure '{measure}'"))?;
            let def = definition(measure);
            def.validate_score(baseline)?;
            print_json(&serde_json::json!({
                "measure": def.abbreviation,
                "name": def.name.get(locale_from_env()),
                "baseline": baseline,
                "mcid": def.mcid,
                "higherIsBetter": def.higher_is_better,
                "target": def.target_from(baseline),
            }))?;
        }

        Command::ChecklistProgress { template, responses } => {
            let raw = std::fs::read_to_string(&template)
                .with_context(|| format!("reading {}", template.display()))?;
            let template: ChecklistTemplate = serde_json::from_str::<ApiChecklistTemplate>(&raw)?.into();

            let raw = std::fs::read_to_string(&responses)
                .with_context(|| format!("reading {}", responses.display()))?;
            let responses: Responses = serde_json::from_str::<serde_json::Map<String, Value>>(&raw)?
                .into_iter()
                .collect();

            print_json(&compute_progress(&template, &responses))?;
            for item in missing_required(&template, &responses) {
                eprintln!("missing: {} ({})", item.id, item.label);
            }
        }

        Command::ExportClaim { claim_id, out } => {
            let (client, _) = connect()?;
            let file = claims::export_claim_xml(&client, claim_id).await?;
            save(&file, &out)?;
        }

        Command::DischargePdf { patient_id, out } => {
            let (client, cfg) = connect()?;
            let file = discharge::download_summary_pdf(&client, patient_id, cfg.locale).await?;
            save(&file, &out)?;
        }

        Command::ExportReport { kind, from, to, out } => {
            let kind = ReportKind::parse(&kind).with_context(|| format!("unknown report '{kind}'"))?;
            let (client, _) = connect()?;
            let file = reports::export_report(&client, kind, from, to).await?;
            save(&file, &out)?;
        }

        Command::Patients { search, page, per_page } => {
            let (client, _) = connect()?;
            let query = PatientQuery {
                list: ListParams {
                    page,
                    per_page,
                    search,
                    sort: None,
                },
                status: None,
            };
            print_json(&patients::list_patients(&client, &query).await?)?;
        }
    }

    Ok(())
}
