use std::collections::BTreeMap;

use tablewright_db::Plan;

/// Print a boxed summary of the plan about to run.
pub fn print_plan(plan: &Plan, mode: Option<&str>) {
    let version = env!("CARGO_PKG_VERSION");

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for step in &plan.steps {
        *counts.entry(step.name()).or_default() += 1;
    }

    let width = 60;
    let inner = width - 4; // "│ " + " │"

    let title = format!("Tablewright v{version}");
    let title_dashes = width - 2 - title.chars().count() - 5; // ╭╮ plus "─── " and " "
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(width - 2));
    let row = |text: &str| format!("│ {text:<inner$} │");

    println!("{top}");
    println!("{}", row(&format!("Migration to {}", plan.version)));
    if let Some(mode) = mode {
        println!("{}", row(&format!("Mode        {mode}")));
    }
    println!("{}", row(&format!("Steps       {}", plan.steps.len())));
    println!("{}", row(&"─".repeat(inner)));
    for (name, count) in &counts {
        println!("{}", row(&format!("{name:<22}{count:>4}")));
    }
    println!("{bottom}");
}
