//! チーム一覧・ロスター表のHTML解析

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::types::{RosterTable, TeamLink};

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// チーム一覧ページから `/<year>/team/.../index.html` のリンクを集める
pub fn team_links(index_html: &str, year: u16) -> Vec<TeamLink> {
    let document = Html::parse_document(index_html);
    let Some(anchor) = selector("a[href]") else {
        return Vec::new();
    };
    let year_path = format!("/{}/team/", year);

    document
        .select(&anchor)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            if !href.contains(&year_path) || !href.ends_with("index.html") {
                return None;
            }
            let name = cell_text(a);
            debug!("チーム検出: {} - リンク: {}", name, href);
            Some(TeamLink {
                name,
                href: href.to_string(),
            })
        })
        .collect()
}

/// `<base>/<year>/team/<id>/roster.html`
pub fn roster_url(base_url: &str, year: u16, team_id: &str) -> String {
    format!(
        "{}/{}/team/{}/roster.html",
        base_url.trim_end_matches('/'),
        year,
        team_id
    )
}

/// 最初の `table.team-roster` を読む
///
/// ヘッダーは1行目の `th`。列数がヘッダーと一致しない行は読み飛ばす。
pub fn parse_roster_table(html: &str) -> Option<RosterTable> {
    let document = Html::parse_document(html);
    let table = document.select(&selector("table.team-roster")?).next()?;
    let tr = selector("tr")?;
    let th = selector("th")?;
    let td = selector("td")?;

    let mut rows = table.select(&tr);
    let headers: Vec<String> = rows.next()?.select(&th).map(cell_text).collect();

    let mut roster = RosterTable {
        headers,
        ..Default::default()
    };

    for row in rows {
        let cells: Vec<String> = row.select(&td).map(cell_text).collect();
        if cells.len() == roster.headers.len() {
            roster.rows.push(cells);
        } else {
            debug!("列数が一致しない行をスキップ: {:?}", cells);
            roster.skipped_rows += 1;
        }
    }

    Some(roster)
}
