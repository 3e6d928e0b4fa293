//! `cabletrace profiles` command - List the cable profile catalog

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::profiles::CableProfile;
use crate::entities::link::CableEnd;

#[derive(clap::Args, Debug)]
pub struct ProfilesArgs {
    /// Only profiles whose key contains this text
    pub filter: Option<String>,
}

#[derive(Tabled, Serialize)]
struct ProfileRow {
    #[tabled(rename = "PROFILE")]
    profile: &'static str,
    #[tabled(rename = "FAMILY")]
    family: String,
    #[tabled(rename = "SIDE A")]
    a: String,
    #[tabled(rename = "SIDE B")]
    b: String,
}

/// `<connectors>C x <positions>P` for one side
fn side(profile: CableProfile, end: CableEnd) -> String {
    format!(
        "{}C x {}P",
        profile.connectors(end),
        profile.positions(end, 1).len()
    )
}

pub fn run(args: ProfilesArgs, global: &GlobalOpts) -> Result<()> {
    let rows: Vec<ProfileRow> = CableProfile::all()
        .iter()
        .filter(|p| {
            args.filter
                .as_deref()
                .map_or(true, |f| p.as_str().contains(f))
        })
        .map(|p| ProfileRow {
            profile: p.as_str(),
            family: p.family().to_string(),
            a: side(*p, CableEnd::A),
            b: side(*p, CableEnd::B),
        })
        .collect();

    match global.format {
        OutputFormat::Pretty => println!("{}", Table::new(rows).with(Style::rounded())),
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&rows).into_diagnostic()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows).into_diagnostic()?),
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for row in &rows {
                wtr.serialize(row).into_diagnostic()?;
            }
            wtr.flush().into_diagnostic()?;
        }
    }
    Ok(())
}
