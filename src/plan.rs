/// Run plan: the cartesian product of models × power modes × swap settings,
/// materialized up front so the operator can review it before anything runs.
use crate::config::BenchConfig;
use std::fmt;

/// One benchmark run. Identity is positional; duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCombination {
    /// 1-based position in the plan.
    pub position: usize,
    /// Total number of combinations in the plan.
    pub total: usize,
    pub model: String,
    pub power_mode: String,
    pub swap: String,
}

impl fmt::Display for RunCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] model={} power_mode={} swap={}",
            self.position, self.total, self.model, self.power_mode, self.swap
        )
    }
}

/// Build the plan in nested order: models, then power modes, then swap settings.
pub fn build_plan(
    models: &[String],
    power_modes: &[String],
    swaps: &[String],
) -> Vec<RunCombination> {
    let total = models.len() * power_modes.len() * swaps.len();
    let mut plan = Vec::with_capacity(total);
    for model in models {
        for power_mode in power_modes {
            for swap in swaps {
                plan.push(RunCombination {
                    position: plan.len() + 1,
                    total,
                    model: model.clone(),
                    power_mode: power_mode.clone(),
                    swap: swap.clone(),
                });
            }
        }
    }
    plan
}

/// Build the plan from a loaded config.
pub fn plan_from_config(config: &BenchConfig) -> Vec<RunCombination> {
    build_plan(
        &config.models_to_test,
        &config.power_modes,
        &config.swap_configurations,
    )
}

/// Render the plan as an operator-facing table.
pub fn format_plan(plan: &[RunCombination]) -> String {
    let model_width = plan
        .iter()
        .map(|c| c.model.len())
        .chain(std::iter::once("MODEL".len()))
        .max()
        .unwrap_or(0);
    let power_width = plan
        .iter()
        .map(|c| c.power_mode.len())
        .chain(std::iter::once("POWER MODE".len()))
        .max()
        .unwrap_or(0);
    let index_width = plan.len().to_string().len().max(1);

    let mut out = format!(
        "Benchmark plan: {} combination(s)\n{:>iw$}  {:<mw$}  {:<pw$}  SWAP\n",
        plan.len(),
        "#",
        "MODEL",
        "POWER MODE",
        iw = index_width,
        mw = model_width,
        pw = power_width,
    );
    for c in plan {
        out.push_str(&format!(
            "{:>iw$}  {:<mw$}  {:<pw$}  {}\n",
            c.position,
            c.model,
            c.power_mode,
            c.swap,
            iw = index_width,
            mw = model_width,
            pw = power_width,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_plan_cartesian_order() {
        let plan = build_plan(
            &strings(&["a", "b"]),
            &strings(&["MAXN", "15W"]),
            &strings(&["on", "off"]),
        );
        assert_eq!(plan.len(), 8);
        let triples: Vec<(&str, &str, &str)> = plan
            .iter()
            .map(|c| (c.model.as_str(), c.power_mode.as_str(), c.swap.as_str()))
            .collect();
        assert_eq!(
            triples,
            vec![
                ("a", "MAXN", "on"),
                ("a", "MAXN", "off"),
                ("a", "15W", "on"),
                ("a", "15W", "off"),
                ("b", "MAXN", "on"),
                ("b", "MAXN", "off"),
                ("b", "15W", "on"),
                ("b", "15W", "off"),
            ]
        );
    }

    #[test]
    fn test_build_plan_positions() {
        let plan = build_plan(&strings(&["a", "b", "c"]), &strings(&["p"]), &strings(&["s"]));
        let positions: Vec<usize> = plan.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(plan.iter().all(|c| c.total == 3));
    }

    #[test]
    fn test_build_plan_keeps_duplicates() {
        let plan = build_plan(&strings(&["a", "a"]), &strings(&["p"]), &strings(&["s"]));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].model, plan[1].model);
        assert_ne!(plan[0], plan[1]);
    }

    #[test]
    fn test_build_plan_empty_axis() {
        let plan = build_plan(&strings(&["a"]), &[], &strings(&["s"]));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_display_combination() {
        let plan = build_plan(&strings(&["llama3"]), &strings(&["MAXN"]), &strings(&["off"]));
        assert_eq!(
            plan[0].to_string(),
            "[1/1] model=llama3 power_mode=MAXN swap=off"
        );
    }

    #[test]
    fn test_format_plan_lists_every_combination() {
        let plan = build_plan(
            &strings(&["llama3:8b", "phi3"]),
            &strings(&["MAXN"]),
            &strings(&["enabled"]),
        );
        let text = format_plan(&plan);
        assert!(text.starts_with("Benchmark plan: 2 combination(s)\n"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains("llama3:8b"));
        assert!(lines[3].starts_with("2  phi3"));
        assert!(lines[3].ends_with("enabled"));
    }
}
