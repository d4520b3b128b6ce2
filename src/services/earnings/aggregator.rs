use chrono::{Datelike, Months, NaiveDate};

use crate::models::{
    earnings::{EarningsBreakdown, ScheduleEntry},
    rates::EarningRates,
};

pub const SCHEDULE_MONTHS: u32 = 12;

pub fn aggregate(paid_children: u32, paid_grand_children: u32, rates: &EarningRates) -> EarningsBreakdown {
    let gross_child = paid_children as f64 * rates.child_earning_pct * rates.price / 100.0;
    let gross_grand_child =
        paid_grand_children as f64 * rates.grand_child_earning_pct * rates.price / 100.0;

    let net_child = gross_child - gross_child * rates.operating_cost_rate / 100.0;
    let net_grand_child = gross_grand_child - gross_grand_child * rates.operating_cost_rate / 100.0;
    let total_annual = net_child + net_grand_child;

    EarningsBreakdown {
        gross_child,
        gross_grand_child,
        net_child,
        net_grand_child,
        total_annual,
        monthly_amount: total_annual / SCHEDULE_MONTHS as f64,
    }
}

/// Twelve calendar months starting with the month of `today`. Income is held
/// for `zero_months` months, so the first entries pay nothing.
pub fn build_schedule(today: NaiveDate, monthly_amount: f64, zero_months: u32) -> Vec<ScheduleEntry> {
    let first_of_month = today.with_day(1).unwrap_or(today);

    (0..SCHEDULE_MONTHS)
        .filter_map(|offset| {
            let month_start = first_of_month.checked_add_months(Months::new(offset))?;

            Some(ScheduleEntry {
                label: month_start.format("%B %Y").to_string(),
                year: month_start.year(),
                month: month_start.month(),
                due_date: last_day_of_month(month_start)?,
                amount: if offset < zero_months { 0.0 } else { monthly_amount },
                current: offset == 0,
            })
        })
        .collect()
}

fn last_day_of_month(month_start: NaiveDate) -> Option<NaiveDate> {
    month_start
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(child: f64, grand_child: f64, cost: f64, price: f64) -> EarningRates {
        EarningRates {
            child_earning_pct: child,
            grand_child_earning_pct: grand_child,
            operating_cost_rate: cost,
            price,
            zero_months: 4,
        }
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn applies_rates_and_operating_cost() {
        let breakdown = aggregate(3, 4, &rates(10.0, 5.0, 20.0, 120.0));

        assert!((breakdown.gross_child - 36.0).abs() < 1e-9);
        assert!((breakdown.gross_grand_child - 24.0).abs() < 1e-9);
        assert!((breakdown.net_child - 28.8).abs() < 1e-9);
        assert!((breakdown.net_grand_child - 19.2).abs() < 1e-9);
        assert!((breakdown.total_annual - 48.0).abs() < 1e-9);
        assert!((breakdown.monthly_amount - 4.0).abs() < 1e-9);
    }

    #[test]
    fn zero_rates_give_zero_earnings() {
        let breakdown = aggregate(10, 25, &rates(0.0, 0.0, 0.0, 120.0));
        assert_eq!(breakdown, EarningsBreakdown::default());
    }

    #[test]
    fn schedule_holds_the_first_months() {
        let schedule = build_schedule(date(2026, 11, 19), 10.0, 4);

        assert_eq!(schedule.len(), 12);
        assert!(schedule[0].current);
        assert!(schedule[1..].iter().all(|entry| !entry.current));
        assert!(schedule[..4].iter().all(|entry| entry.amount == 0.0));
        assert!(schedule[4..].iter().all(|entry| entry.amount == 10.0));

        assert_eq!(schedule[0].label, "November 2026");
        assert_eq!(schedule[0].due_date, date(2026, 11, 30));
        assert_eq!(schedule[2].label, "January 2027");
        assert_eq!(schedule[3].due_date, date(2027, 2, 28));
        assert_eq!(schedule[11].label, "October 2027");
        assert_eq!(schedule[11].due_date, date(2027, 10, 31));
    }

    #[test]
    fn due_dates_handle_leap_years() {
        let schedule = build_schedule(date(2028, 2, 29), 1.0, 0);
        assert_eq!(schedule[0].due_date, date(2028, 2, 29));
        assert_eq!(schedule[1].due_date, date(2028, 3, 31));
    }

    #[test]
    fn schedule_sums_to_payable_share_of_annual_total() {
        let breakdown = aggregate(7, 13, &rates(12.5, 3.3, 17.0, 99.9));

        let held = build_schedule(date(2026, 1, 31), breakdown.monthly_amount, 4);
        let held_sum: f64 = held.iter().map(|entry| entry.amount).sum();
        assert!((held_sum - breakdown.total_annual * 8.0 / 12.0).abs() < 1e-9);

        let unheld = build_schedule(date(2026, 1, 31), breakdown.monthly_amount, 0);
        let unheld_sum: f64 = unheld.iter().map(|entry| entry.amount).sum();
        assert!((unheld_sum - breakdown.total_annual).abs() < 1e-9);
    }

    #[test]
    fn holding_period_longer_than_schedule_pays_nothing() {
        let schedule = build_schedule(date(2026, 5, 1), 10.0, 20);
        assert!(schedule.iter().all(|entry| entry.amount == 0.0));
    }
}
