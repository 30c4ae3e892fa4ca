use std::error::Error;

use anima_core::clock;
use chrono::{Datelike, Local};
use clap::Subcommand;
use serde_json::json;

#[derive(Subcommand)]
pub enum CalendarAction {
    /// Print today's epoch-day key
    Today,
    /// Print the epoch-day range of a month (defaults to the current one)
    Month {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
}

pub fn run(action: CalendarAction) -> Result<(), Box<dyn Error>> {
    match action {
        CalendarAction::Today => {
            let key = clock::today_key();
            let out = json!({
                "epoch_day": key,
                "date": clock::date_for_epoch_day(key).map(|d| d.to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        CalendarAction::Month { year, month } => {
            let today = Local::now().date_naive();
            let year = year.unwrap_or(today.year());
            let month = month.unwrap_or(today.month());
            let (first, last) = clock::epoch_day_range_for_month(year, month)?;
            let out = json!({
                "year": year,
                "month": month,
                "first_epoch_day": first,
                "last_epoch_day": last,
                "days": last - first + 1,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
