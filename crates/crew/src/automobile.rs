//! The automobile research crew: five specialists, five assignments

use std::sync::Arc;
use tracing::warn;

use motorcrew_agent::{RetryPolicy, ToolRegistry, ToolSet, Worker};
use motorcrew_config::Config;
use motorcrew_provider::Provider;

use crate::crew::{Crew, CrewOutput};
use crate::process::Process;
use crate::report::{missing_sections, ReportSection};
use crate::unit::{UnitTemplate, WorkUnit};
use crate::{CrewError, Result};

pub const RESEARCH: &str = "research";
pub const PRICING: &str = "pricing";
pub const MAINTENANCE: &str = "maintenance";
pub const PERFORMANCE: &str = "performance";
pub const REPORT: &str = "report";

const FIELD_TOOLS: [&str; 2] = ["web_search", "web_scrape"];
const WRITER_TOOLS: [&str; 1] = ["write_file"];

/// The five workers of the automobile crew
#[derive(Debug, Clone)]
pub struct Roster {
    pub research: Arc<Worker>,
    pub pricing: Arc<Worker>,
    pub maintenance: Arc<Worker>,
    pub performance: Arc<Worker>,
    pub report: Arc<Worker>,
}

impl Roster {
    /// Build all workers on one provider, with model settings from `config`
    pub fn build(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        config: &Config,
    ) -> Result<Self> {
        let field = ToolSet::new(registry.clone(), FIELD_TOOLS)?;
        let writer = ToolSet::new(registry, WRITER_TOOLS)?;

        let make = |role: &str, goal: &str, backstory: &str, tools: &ToolSet| {
            Arc::new(
                Worker::new(role, goal, backstory, provider.clone(), tools.clone())
                    .with_model(config.model.name.clone())
                    .with_temperature(config.model.temperature)
                    .with_max_tokens(config.model.max_tokens)
                    .with_max_iterations(config.crew.max_iterations),
            )
        };

        Ok(Self {
            research: make(
                "Automobile Research Specialist",
                "Gather detailed specifications and features of automobiles",
                "You're an expert in automotive technology with years of experience researching vehicle specifications.",
                &field,
            ),
            pricing: make(
                "Automobile Pricing Analyst",
                "Analyze pricing trends and provide cost estimates for automobiles",
                "You're a skilled pricing analyst specializing in the automotive market.",
                &field,
            ),
            maintenance: make(
                "Maintenance Analyst",
                "Provide maintenance schedules and cost estimates",
                "You're an experienced mechanic with expertise in vehicle maintenance.",
                &field,
            ),
            performance: make(
                "Performance Tester",
                "Analyze vehicle performance metrics and capabilities",
                "You're a test driver with deep knowledge of vehicle performance characteristics.",
                &field,
            ),
            report: make(
                "Automobile Report Writer",
                "Create comprehensive reports based on all collected data",
                "You're an experienced technical writer specializing in automobile reports.",
                &writer,
            ),
        })
    }

    pub fn worker_for(&self, unit_id: &str) -> Option<Arc<Worker>> {
        let worker = match unit_id {
            RESEARCH => &self.research,
            PRICING => &self.pricing,
            MAINTENANCE => &self.maintenance,
            PERFORMANCE => &self.performance,
            REPORT => &self.report,
            _ => return None,
        };
        Some(worker.clone())
    }
}

/// Unit templates in execution order
pub fn templates() -> Vec<UnitTemplate> {
    vec![
        UnitTemplate::new(
            RESEARCH,
            "Research detailed specifications for the {subject}.\n\
             Include:\n\
             - Engine specifications\n\
             - Dimensions\n\
             - Fuel economy\n\
             - Safety features\n\
             - Technology features\n\
             Use both search and web scraping tools.",
            "A detailed summary of the car's specifications",
        ),
        UnitTemplate::new(
            PRICING,
            "Analyze pricing for the {subject}.\n\
             Include:\n\
             - Base MSRP\n\
             - Trim levels and prices\n\
             - Average market price\n\
             - Incentives/discounts\n\
             Use web scraping for additional data.",
            "A comprehensive pricing analysis",
        ),
        UnitTemplate::new(
            MAINTENANCE,
            "Research maintenance information for the {subject}.\n\
             Include:\n\
             - Recommended maintenance schedule\n\
             - Common issues\n\
             - Average maintenance costs\n\
             - Warranty information",
            "A detailed maintenance analysis",
        ),
        UnitTemplate::new(
            PERFORMANCE,
            "Analyze performance metrics for the {subject}.\n\
             Include:\n\
             - Acceleration (0-60 mph)\n\
             - Top speed\n\
             - Handling characteristics\n\
             - Braking distance",
            "A comprehensive performance analysis",
        ),
        UnitTemplate::new(
            REPORT,
            "Create a comprehensive report for the {subject} using all data.\n\
             Include:\n\
             - Executive summary\n\
             - Specifications\n\
             - Pricing analysis\n\
             - Maintenance information\n\
             - Performance metrics\n\
             Save the report as '{subject}_report.md'",
            "A complete report in markdown format saved to file",
        )
        .with_artifact("{subject}_report.md"),
    ]
}

/// Instantiate the five units for `subject`
pub fn units_for(subject: &str, roster: &Roster) -> Result<Vec<WorkUnit>> {
    templates()
        .iter()
        .map(|t| -> Result<WorkUnit> {
            let worker = roster
                .worker_for(&t.id)
                .ok_or_else(|| CrewError::UnknownWorker(t.id.clone()))?;
            Ok(t.instantiate(subject, worker))
        })
        .collect()
}

/// A configured crew for `subject`
pub fn crew_for(subject: &str, roster: &Roster, config: &Config) -> Result<Crew> {
    let process: Process = config.crew.process.parse()?;
    Ok(Crew::new(units_for(subject, roster)?)?
        .with_policy(process.policy())?
        .with_retry(RetryPolicy::from_config(&config.crew.retry))
        .with_output_dir(config.output_dir()))
}

/// Report sections absent from the saved report, or from the final result
/// when nothing was saved. Logged, never fatal.
pub async fn review_report(output: &CrewOutput) -> Vec<ReportSection> {
    let saved = match output.artifacts.last() {
        Some(path) => tokio::fs::read_to_string(path).await.ok(),
        None => None,
    };
    let missing = missing_sections(saved.as_deref().unwrap_or(&output.result));
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|s| s.heading()).collect();
        warn!("◆ REPORT MISSING SECTIONS: {}", names.join(", "));
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_in_order() {
        let ids: Vec<String> = templates().into_iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            vec![RESEARCH, PRICING, MAINTENANCE, PERFORMANCE, REPORT]
        );
    }

    #[test]
    fn test_only_report_has_artifact() {
        let with_artifact: Vec<String> = templates()
            .into_iter()
            .filter(|t| t.artifact.is_some())
            .map(|t| t.id)
            .collect();
        assert_eq!(with_artifact, vec![REPORT]);
    }
}
