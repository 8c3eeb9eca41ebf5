//! Output formatting for multiple formats
//!
//! Every command renders through [`OutputFormatter`], which produces JSON,
//! YAML or human-readable text from the same serializable report types.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::build_systems::BuildSystem;
use crate::config::PhasekitConfig;
use crate::pipeline::InstallOutcome;
use crate::spec::PackageSpec;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// One registered build system, as listed by `build-systems`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSystemInfo {
    pub kind: String,
    pub tool: String,
    pub manifests: Vec<String>,
    pub phases: Vec<String>,
    pub test_callbacks: Vec<String>,
    pub implicit_dependencies: Vec<String>,
}

impl BuildSystemInfo {
    pub fn describe(system: &dyn BuildSystem) -> Self {
        Self {
            kind: system.id().to_string(),
            tool: system.tool().to_string(),
            manifests: system
                .manifest_patterns()
                .iter()
                .map(|p| p.filename.to_string())
                .collect(),
            phases: system.phases().iter().map(|p| p.to_string()).collect(),
            test_callbacks: system
                .install_time_tests()
                .iter()
                .map(|c| c.name.to_string())
                .collect(),
            implicit_dependencies: system
                .implicit_dependencies()
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

/// A toolchain edge and whether the spec carries it.
#[derive(Debug, Clone, Serialize)]
pub struct ToolchainDependency {
    pub requirement: String,
    pub active: bool,
    pub satisfied: bool,
}

/// Build plan for one request, as printed by `show`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub package: String,
    pub identity: String,
    pub dag_hash: String,
    pub build_system: BuildSystemInfo,
    pub source: PathBuf,
    pub build_directory: PathBuf,
    pub prefix: PathBuf,
    pub toolchain: Vec<ToolchainDependency>,
    pub environment: BTreeMap<String, String>,
}

impl BuildPlan {
    pub fn new(spec: &PackageSpec, system: &dyn BuildSystem, source: PathBuf, prefix: PathBuf) -> Self {
        let toolchain = system
            .implicit_dependencies()
            .iter()
            .map(|dep| ToolchainDependency {
                requirement: dep.requirement.to_string(),
                active: dep.is_active(spec),
                satisfied: dep.is_satisfied_by(spec),
            })
            .collect();

        Self {
            package: spec.to_string(),
            identity: spec.identity(),
            dag_hash: spec.dag_hash(),
            build_system: BuildSystemInfo::describe(system),
            build_directory: system.build_directory(&source),
            environment: system.build_environment(spec, &prefix),
            source,
            prefix,
            toolchain,
        }
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T, what: &str) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)
                .with_context(|| format!("Failed to serialize {} to YAML", what)),
            _ => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what)),
        }
    }

    pub fn format_outcomes(&self, outcomes: &[InstallOutcome]) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(format_outcomes_human(outcomes)),
            _ => self.serialize(outcomes, "install outcomes"),
        }
    }

    pub fn format_build_systems(&self, systems: &[BuildSystemInfo]) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(format_build_systems_human(systems)),
            _ => self.serialize(systems, "build systems"),
        }
    }

    pub fn format_plan(&self, plan: &BuildPlan) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(format_plan_human(plan)),
            _ => self.serialize(plan, "build plan"),
        }
    }

    pub fn format_config(&self, config: &PhasekitConfig) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(config.to_string()),
            _ => self.serialize(&config.to_display_map(), "config"),
        }
    }
}

fn format_outcomes_human(outcomes: &[InstallOutcome]) -> String {
    let mut output = String::new();

    for outcome in outcomes {
        let symbol = if outcome.tests_failed() {
            "\u{26A0}"
        } else {
            "\u{2713}"
        };
        let _ = writeln!(output, "{} {}", symbol, outcome.identity);
        let _ = writeln!(output, "{}", RULE);
        let _ = writeln!(output, "State:   {}", outcome.state);
        let _ = writeln!(output, "Prefix:  {}", outcome.prefix.display());
        let phases: Vec<String> = outcome.phases_run.iter().map(|p| p.to_string()).collect();
        let _ = writeln!(output, "Phases:  {}", phases.join(" \u{2192} "));

        let records = outcome.tests.records();
        if records.is_empty() {
            let _ = writeln!(output, "Install-time tests: (none)");
        } else {
            let _ = writeln!(output, "Install-time tests:");
            for (i, record) in records.iter().enumerate() {
                let connector = if i + 1 == records.len() {
                    "\u{2514}\u{2500}"
                } else {
                    "\u{251C}\u{2500}"
                };
                let _ = writeln!(output, "{} {:<20} {}", connector, record.part, record.status);
            }
        }
        output.push('\n');
    }

    let failed = outcomes.iter().filter(|o| o.tests_failed()).count();
    let _ = writeln!(
        output,
        "{} package(s) installed, {} with failing install-time tests",
        outcomes.len(),
        failed
    );
    output
}

fn format_build_systems_human(systems: &[BuildSystemInfo]) -> String {
    let mut output = String::new();
    output.push_str("Registered Build Systems\n");
    output.push_str(RULE);
    output.push_str("\n\n");

    for info in systems {
        let _ = writeln!(output, "{} ({})", info.kind, info.tool);
        let _ = writeln!(output, "\u{251C}\u{2500} Manifests:  {}", info.manifests.join(", "));
        let _ = writeln!(output, "\u{251C}\u{2500} Phases:     {}", info.phases.join(" \u{2192} "));
        let _ = writeln!(
            output,
            "\u{251C}\u{2500} Tests:      {}",
            none_if_empty(&info.test_callbacks)
        );
        let _ = writeln!(
            output,
            "\u{2514}\u{2500} Toolchain:  {}",
            none_if_empty(&info.implicit_dependencies)
        );
        output.push('\n');
    }
    output
}

fn format_plan_human(plan: &BuildPlan) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Build Plan: {}", plan.identity);
    let _ = writeln!(output, "{}\n", RULE);
    let _ = writeln!(output, "Spec:             {}", plan.package);
    let _ = writeln!(output, "Hash:             {}", plan.dag_hash);
    let _ = writeln!(output, "Build System:     {} ({})", plan.build_system.kind, plan.build_system.tool);
    let _ = writeln!(output, "Phases:           {}", plan.build_system.phases.join(" \u{2192} "));
    let _ = writeln!(
        output,
        "Tests:            {}",
        none_if_empty(&plan.build_system.test_callbacks)
    );
    let _ = writeln!(output, "Source:           {}", plan.source.display());
    let _ = writeln!(output, "Build Directory:  {}", plan.build_directory.display());
    let _ = writeln!(output, "Prefix:           {}", plan.prefix.display());

    if !plan.toolchain.is_empty() {
        output.push_str("\nToolchain:\n");
        for dep in &plan.toolchain {
            let state = match (dep.active, dep.satisfied) {
                (false, _) => "inactive",
                (true, true) => "provided",
                (true, false) => "from PATH",
            };
            let _ = writeln!(output, "  - {} ({})", dep.requirement, state);
        }
    }

    if !plan.environment.is_empty() {
        output.push_str("\nEnvironment:\n");
        for (key, value) in &plan.environment {
            let _ = writeln!(output, "  {}={}", key, value);
        }
    }
    output
}

fn none_if_empty(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
