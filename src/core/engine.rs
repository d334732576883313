use super::types::{MonthRecord, ProjectionInput, ProjectionSummary};

const MONTHS_PER_YEAR: u32 = 12;

/// Runs the month-by-month compound projection until `goal` is reached or
/// `max_months` iterations have been emitted.
///
/// The returned schedule is never empty. When the starting balance already
/// meets the goal a single placeholder month (`month = 1`, `year = 1`) is
/// reported with no contribution or interest. Hitting the iteration cap is not
/// an error: the caller sees `len() == max_months` and a final total below the
/// goal. A cap of zero is treated as one.
pub fn project(input: &ProjectionInput) -> Vec<MonthRecord> {
    let initial = input.initial_contribution;
    let monthly = input.monthly_contribution;
    let rate = input.rate_decimal();

    if initial >= input.goal {
        return vec![MonthRecord {
            month: 1,
            year: 1,
            monthly_contribution: 0.0,
            accumulated_contributions: initial,
            monthly_interest: 0.0,
            accumulated_interest: 0.0,
            total: initial,
        }];
    }

    let mut months = Vec::new();
    let mut current_total = initial;
    let mut total_contributed = initial;
    let mut total_interest = 0.0;
    let mut month_count: u32 = 0;
    let max_months = input.max_months.max(1);

    while current_total < input.goal && month_count < max_months {
        month_count += 1;

        let previous_total = current_total;
        let previous_contributed = total_contributed;
        let previous_interest = total_interest;

        total_contributed += monthly;
        current_total = (previous_total + monthly) * (1.0 + rate);

        let monthly_interest = current_total - previous_total - monthly;
        total_interest += monthly_interest;

        months.push(MonthRecord {
            month: month_of_year(month_count),
            year: year_of(month_count),
            monthly_contribution: monthly,
            accumulated_contributions: previous_contributed,
            monthly_interest,
            accumulated_interest: previous_interest,
            total: current_total,
        });
    }

    months
}

/// Derives the figures stored alongside a saved calculation from the last
/// month of a schedule.
pub fn summarize(months: &[MonthRecord], goal: f64) -> Option<ProjectionSummary> {
    let last = months.last()?;
    Some(ProjectionSummary {
        months_to_reach_goal: months.len(),
        final_amount: last.total,
        total_contributed: last.accumulated_contributions + last.monthly_contribution,
        total_interest: last.accumulated_interest + last.monthly_interest,
        goal_reached: last.total >= goal,
    })
}

/// Display rounding only: two decimals, comma thousands separators.
pub fn format_currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{cents}")
}

fn year_of(month_count: u32) -> u32 {
    month_count.div_ceil(MONTHS_PER_YEAR)
}

fn month_of_year(month_count: u32) -> u32 {
    ((month_count - 1) % MONTHS_PER_YEAR) + 1
}
