//! ロスター表スクレイパーモジュール
//!
//! cfbstats のチーム一覧から各チームのロスター表を取得して年度別にCSV保存する

mod client;
mod parse;
mod types;

pub use client::{write_roster_csv, TableScraper};
pub use parse::{parse_roster_table, roster_url, team_links};
pub use types::{RosterTable, TableScrapeConfig, TeamLink, YearSummary};
