//! Market status report (实时市场状态).

use chrono::Local;
use tma_common::util::format_percent;
use tma_common::{IndicatorConfig, Result};

use crate::collector::{Collector, SnapshotFilters};
use crate::indicator::{
    limit_board_list, IndicatorReport, IndicatorSet, LimitBoardEntry, MarketDayIndicator,
};

/// Render the market indicator set as a markdown status block.
///
/// Missing keys render as "-".
pub fn render_market_status(set: &IndicatorSet) -> String {
    let count = |key: &str| {
        set.get(key)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let rate = |key: &str| {
        set.get_f64(key)
            .map(format_percent)
            .unwrap_or_else(|| "-".to_string())
    };

    format!(
        "### 实时市场状态\n --- \n\
         * 今日开盘个股总数为{}家，上涨个股数量为{}家，**赚钱效应{}**；\
         其中涨3个点以上个股数量是{}家，跌3个点以上个股数量是{}家。\n\
         * 换手率前50只个股赚钱效应{}，其中涨3个点以上个股数量是{}家，\
         跌3个点以上个股数量是{}家。\n\
         * 目前两市涨停{}家，其中一字板{}家；盘中触及涨停后打开家数为{}，\
         封板成功率为{}；两市跌停{}家，其中一字板跌停{}家，盘中触及跌停板{}家。\n\n",
        count("M002"),
        count("M003"),
        rate("M001"),
        count("M004"),
        count("M005"),
        rate("M006"),
        count("M007"),
        count("M008"),
        count("M009"),
        count("M010"),
        count("M011"),
        rate("M012"),
        count("M013"),
        count("M014"),
        count("M015"),
    )
}

/// Render limit boards as a markdown table.
pub fn render_limit_boards(boards: &[LimitBoardEntry]) -> String {
    if boards.is_empty() {
        return "### 涨跌停板\n\n无\n".to_string();
    }

    let mut out = String::from(
        "### 涨跌停板\n\n| 代码 | 名称 | 现价 | 类型 | 换手率 | 涨跌幅 |\n|---|---|---|---|---|---|\n",
    );
    for b in boards {
        out.push_str(&format!(
            "| {} | {} | {:.2} | {} | {:.2}% | {:.2}% |\n",
            b.code,
            b.name,
            b.trade,
            b.kind(),
            b.turnover_ratio,
            b.change_percent
        ));
    }
    out
}

/// Collect today's market indicators and render the status report.
///
/// Returns the markdown report (status block and board table) along with
/// the indicator report it was built from.
pub async fn market_status(
    collector: &dyn Collector,
    config: &IndicatorConfig,
) -> Result<(String, IndicatorReport)> {
    let rows = collector
        .get_market_snapshot(&SnapshotFilters::default())
        .await?;

    let indicator = MarketDayIndicator::new(config);
    let report = indicator.compute(&rows);
    let boards = limit_board_list(&rows, indicator.band());

    let markdown = format!(
        "{}{}\n> {}",
        render_market_status(&report.indicators),
        render_limit_boards(&boards),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    Ok((markdown, report))
}
