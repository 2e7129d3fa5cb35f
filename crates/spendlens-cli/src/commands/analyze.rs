use anyhow::{Context, Result, anyhow, bail};
use spendlens_application::ClientContext;
use spendlens_core::analysis::NormalizedAnalysis;

pub async fn run(ctx: &ClientContext, json: bool) -> Result<()> {
    let analysis = ctx
        .analysis
        .fetch()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    let Some(analysis) = analysis else {
        bail!("The session changed while the analysis was running, please try again");
    };

    if json {
        let rendered =
            serde_json::to_string_pretty(&analysis).context("Failed to render analysis as JSON")?;
        println!("{}", rendered);
    } else {
        print_report(&analysis);
    }
    Ok(())
}

fn print_report(analysis: &NormalizedAnalysis) {
    let result = &analysis.result;

    println!("Spending Analysis");
    if result.from_cache {
        println!("(cached result)");
    }
    println!();
    println!("Spending pattern:   {}", result.basic_analysis.spending_pattern);
    println!("Average spending:   {}", result.basic_analysis.avg_spending);
    println!("Shopping frequency: {}", result.basic_analysis.shopping_frequency);

    println!();
    if analysis.chart.is_empty() {
        println!("No categories found");
    } else {
        println!("Categories ({} items):", analysis.chart.total_items);
        let width = analysis
            .chart
            .categories
            .iter()
            .map(|c| c.name.chars().count())
            .max()
            .unwrap_or(0);
        for category in &analysis.chart.categories {
            println!(
                "  {:<width$}  {:>5}  {:>6}  {}",
                category.name,
                category.count,
                category.percent_label(1),
                category.color,
                width = width
            );
        }
    }

    print_list("Frequently bought", &result.items_analysis.frequently_bought);
    print_list("Preferred stores", &result.shopping_habits.preferred_stores);
    println!();
    println!("Time patterns: {}", result.shopping_habits.time_patterns);

    if !result.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for (i, recommendation) in result.recommendations.iter().enumerate() {
            println!("  {}. {}", i + 1, recommendation);
        }
    }
}

fn print_list(title: &str, items: &[String]) {
    println!();
    if items.is_empty() {
        println!("{}: none", title);
    } else {
        println!("{}: {}", title, items.join(", "));
    }
}
