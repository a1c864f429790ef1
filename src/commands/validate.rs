use anyhow::Result;
use tracing::{info, warn};

use webmatrix::{ConfigPaths, MatrixConfig, OutputFormat};

pub fn handle_validate(paths: ConfigPaths, groups: Vec<String>, format: OutputFormat) -> Result<()> {
    let config = MatrixConfig::load(&paths)?;
    let groups = if groups.is_empty() {
        config.selected_groups.clone()
    } else {
        groups
    };

    let mut combinations = 0;
    let mut missing = Vec::new();
    for group in &groups {
        combinations += config.viewports(group)?.len() * config.browsers.len();
        for (test_case, assertion, class) in config.missing_baselines(group) {
            warn!(
                "Test case '{}' assertion '{}' references class '{}' with no baseline in group '{}'",
                test_case, assertion, class, group
            );
            missing.push(serde_json::json!({
                "group": group,
                "test_case": test_case,
                "assertion": assertion,
                "class": class,
            }));
        }
    }
    info!("Configuration is valid");

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "url": config.url,
                    "browsers": config.browsers,
                    "groups": groups,
                    "combinations": combinations,
                    "test_cases": config.test_cases.iter().map(|t| &t.name).collect::<Vec<_>>(),
                    "missing_baselines": missing,
                }))?
            );
        }
        OutputFormat::Simple => {
            println!("URL: {}", config.url);
            println!(
                "Browsers: {}",
                config
                    .browsers
                    .iter()
                    .map(|b| b.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            for group in &groups {
                let viewports = config.viewports(group)?;
                println!(
                    "Group {}: {}",
                    group,
                    viewports
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            println!("Combinations: {}", combinations);
            for test_case in &config.test_cases {
                let assertions = test_case.assertions.len()
                    + test_case
                        .locators
                        .iter()
                        .map(|l| l.assertions.len())
                        .sum::<usize>();
                println!(
                    "Test case {} ({}): {} locator(s), {} assertion(s)",
                    test_case.name,
                    test_case.locator,
                    test_case.locators.len(),
                    assertions
                );
            }
            if !missing.is_empty() {
                println!("Missing baselines: {}", missing.len());
            }
        }
    }
    Ok(())
}
