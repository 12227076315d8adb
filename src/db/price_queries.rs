use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::error;

use crate::models::{
    AggregateMetrics, Bounds, ConsolidatedRow, DateRange, Direction, ExtremumField,
    NormalizedRecord, PriceFilter, PriceRecord,
};

const RECORD_COLUMNS: &str = "SELECT id, ticker, date, open, high, low, close, adj_close, volume, avg_price, variation_pct
     FROM price_records";

/// Insert normalized rows for `ticker`, skipping any (ticker, date) already stored.
///
/// Runs in one transaction. Returns how many rows were actually written.
pub async fn insert_batch(
    pool: &SqlitePool,
    ticker: &str,
    records: &[NormalizedRecord],
) -> Result<u64, sqlx::Error> {
    let ticker = ticker.to_uppercase();
    let mut tx = pool.begin().await.map_err(|e| {
        error!("Failed to begin transaction for ticker {}: {}", ticker, e);
        e
    })?;

    let mut inserted = 0;
    for r in records {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO price_records
                (ticker, date, open, high, low, close, adj_close, volume, avg_price, variation_pct)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&ticker)
        .bind(r.date)
        .bind(r.open)
        .bind(r.high)
        .bind(r.low)
        .bind(r.close)
        .bind(r.adj_close)
        .bind(r.volume)
        .bind(r.avg_price)
        .bind(r.variation_pct)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to insert {} row for {}: {}", ticker, r.date, e);
            e
        })?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn list_tickers(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT DISTINCT ticker FROM price_records ORDER BY ticker")
        .fetch_all(pool)
        .await
}

/// Rows for `ticker` matching every bound in `filter`, newest first.
pub async fn fetch_filtered(
    pool: &SqlitePool,
    ticker: &str,
    limit: i64,
    filter: &PriceFilter,
) -> Result<Vec<PriceRecord>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(RECORD_COLUMNS);
    qb.push(" WHERE ticker = ").push_bind(ticker.to_uppercase());
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY date DESC LIMIT ").push_bind(limit);

    qb.build_query_as::<PriceRecord>().fetch_all(pool).await
}

/// The row holding the max/min of `field`. Rows where `field` is null never
/// qualify; ties go to the earliest date.
pub async fn fetch_extremum(
    pool: &SqlitePool,
    ticker: &str,
    range: &DateRange,
    field: ExtremumField,
    direction: Direction,
) -> Result<Option<PriceRecord>, sqlx::Error> {
    let column = field.column();

    let mut qb = QueryBuilder::<Sqlite>::new(RECORD_COLUMNS);
    qb.push(" WHERE ticker = ").push_bind(ticker.to_uppercase());
    push_range(&mut qb, range);
    qb.push(format!(
        " AND {column} IS NOT NULL ORDER BY {column} {}, date ASC LIMIT 1",
        direction.sql_order()
    ));

    qb.build_query_as::<PriceRecord>().fetch_optional(pool).await
}

#[derive(Debug, FromRow)]
struct AggregateRow {
    row_count: i64,
    avg_price: Option<f64>,
    max_close: Option<f64>,
    min_close: Option<f64>,
    avg_volume: Option<f64>,
}

/// Summary over matching rows; `None` when nothing matches.
pub async fn fetch_aggregate(
    pool: &SqlitePool,
    ticker: &str,
    filter: &PriceFilter,
) -> Result<Option<AggregateMetrics>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        r#"SELECT COUNT(*) AS row_count,
                  AVG(avg_price) AS avg_price,
                  MAX(close) AS max_close,
                  MIN(close) AS min_close,
                  AVG(volume) AS avg_volume
           FROM price_records"#,
    );
    qb.push(" WHERE ticker = ").push_bind(ticker.to_uppercase());
    push_filter(&mut qb, filter);

    let row = qb.build_query_as::<AggregateRow>().fetch_one(pool).await?;
    if row.row_count == 0 {
        return Ok(None);
    }

    Ok(Some(AggregateMetrics {
        avg_price: row.avg_price,
        max_close: row.max_close,
        min_close: row.min_close,
        avg_volume: row.avg_volume,
    }))
}

/// Derived-field table across one or all tickers, ordered by ticker then date.
pub async fn fetch_consolidated(
    pool: &SqlitePool,
    ticker: Option<&str>,
    range: &DateRange,
) -> Result<Vec<ConsolidatedRow>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT ticker, date, avg_price, variation_pct FROM price_records WHERE 1=1",
    );
    if let Some(ticker) = ticker {
        qb.push(" AND ticker = ").push_bind(ticker.to_uppercase());
    }
    push_range(&mut qb, range);
    qb.push(" ORDER BY ticker ASC, date ASC");

    qb.build_query_as::<ConsolidatedRow>().fetch_all(pool).await
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PriceFilter) {
    push_range(qb, &filter.range);
    push_bounds(qb, "close", &filter.price);
    push_bounds(qb, "volume", &filter.volume);
}

fn push_range(qb: &mut QueryBuilder<'_, Sqlite>, range: &DateRange) {
    if let Some(start) = range.start {
        qb.push(" AND date >= ").push_bind(start);
    }
    if let Some(end) = range.end {
        qb.push(" AND date <= ").push_bind(end);
    }
}

fn push_bounds(qb: &mut QueryBuilder<'_, Sqlite>, column: &'static str, bounds: &Bounds) {
    if let Some(min) = bounds.min {
        qb.push(format!(" AND {column} >= ")).push_bind(min);
    }
    if let Some(max) = bounds.max {
        qb.push(format!(" AND {column} <= ")).push_bind(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(d: NaiveDate, open: f64, close: f64, volume: f64) -> NormalizedRecord {
        NormalizedRecord::new(d, open, Some(close.max(open)), Some(close.min(open)), close, Some(close), Some(volume))
    }

    async fn seeded_pool() -> SqlitePool {
        let pool = connect_in_memory().await.unwrap();
        let aapl = vec![
            bar(date(2020, 1, 2), 10.0, 12.0, 100.0),
            bar(date(2020, 1, 3), 12.0, 11.0, 300.0),
            bar(date(2020, 1, 6), 11.0, 9.0, 300.0),
            bar(date(2020, 1, 7), 9.0, 0.0, 0.0),
            bar(date(2020, 2, 3), 9.0, 15.0, 50.0),
        ];
        insert_batch(&pool, "aapl", &aapl).await.unwrap();
        insert_batch(&pool, "MSFT", &[bar(date(2020, 1, 2), 100.0, 101.0, 10.0)])
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let pool = connect_in_memory().await.unwrap();
        let rows = vec![bar(date(2020, 1, 2), 10.0, 12.0, 1.0), bar(date(2020, 1, 3), 12.0, 13.0, 1.0)];

        assert_eq!(insert_batch(&pool, "aapl", &rows).await.unwrap(), 2);
        assert_eq!(insert_batch(&pool, "AAPL", &rows).await.unwrap(), 0);

        let stored = fetch_filtered(&pool, "AAPL", 100, &PriceFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_keeps_first_values() {
        let pool = connect_in_memory().await.unwrap();
        insert_batch(&pool, "AAPL", &[bar(date(2020, 1, 2), 10.0, 12.0, 1.0)]).await.unwrap();
        insert_batch(&pool, "AAPL", &[bar(date(2020, 1, 2), 50.0, 60.0, 9.0)]).await.unwrap();

        let stored = fetch_filtered(&pool, "AAPL", 10, &PriceFilter::default()).await.unwrap();
        assert_eq!(stored[0].open, Some(10.0));
        assert_eq!(stored[0].close, Some(12.0));
    }

    #[tokio::test]
    async fn test_list_tickers_sorted_distinct() {
        let pool = seeded_pool().await;
        assert_eq!(list_tickers(&pool).await.unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn test_filtered_without_bounds_is_newest_first_and_limited() {
        let pool = seeded_pool().await;
        let rows = fetch_filtered(&pool, "aapl", 3, &PriceFilter::default()).await.unwrap();

        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2020, 2, 3), date(2020, 1, 7), date(2020, 1, 6)]);
        assert!(rows.iter().all(|r| r.ticker == "AAPL"));
    }

    #[tokio::test]
    async fn test_filtered_range_is_inclusive() {
        let pool = seeded_pool().await;
        let filter = PriceFilter {
            range: DateRange::new(Some(date(2020, 1, 3)), Some(date(2020, 1, 6))),
            ..Default::default()
        };
        let rows = fetch_filtered(&pool, "AAPL", 10, &filter).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_bounds_apply() {
        let pool = seeded_pool().await;

        let max_price_zero = PriceFilter {
            price: Bounds::new(None, Some(0.0)),
            ..Default::default()
        };
        let rows = fetch_filtered(&pool, "AAPL", 10, &max_price_zero).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, date(2020, 1, 7));

        let max_volume_zero = PriceFilter {
            volume: Bounds::new(Some(0.0), Some(0.0)),
            ..Default::default()
        };
        let rows = fetch_filtered(&pool, "AAPL", 10, &max_volume_zero).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_highest_volume_tie_goes_to_earliest_date() {
        let pool = seeded_pool().await;
        let row = fetch_extremum(&pool, "AAPL", &DateRange::default(), ExtremumField::Volume, Direction::Max)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.date, date(2020, 1, 3));
        assert_eq!(row.volume, Some(300.0));
    }

    #[tokio::test]
    async fn test_lowest_close_within_range() {
        let pool = seeded_pool().await;
        let range = DateRange::new(None, Some(date(2020, 1, 6)));
        let row = fetch_extremum(&pool, "AAPL", &range, ExtremumField::Close, Direction::Min)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.date, date(2020, 1, 6));
        assert_eq!(row.close, Some(9.0));
    }

    #[tokio::test]
    async fn test_extremum_ignores_null_field() {
        let pool = connect_in_memory().await.unwrap();
        let mut no_volume = bar(date(2021, 5, 3), 1.0, 2.0, 0.0);
        no_volume.volume = None;
        insert_batch(&pool, "XYZ", &[no_volume, bar(date(2021, 5, 4), 1.0, 2.0, 5.0)]).await.unwrap();

        let row = fetch_extremum(&pool, "XYZ", &DateRange::default(), ExtremumField::Volume, Direction::Max)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.date, date(2021, 5, 4));
    }

    #[tokio::test]
    async fn test_extremum_unknown_ticker_is_none() {
        let pool = seeded_pool().await;
        let row = fetch_extremum(&pool, "NOPE", &DateRange::default(), ExtremumField::Close, Direction::Min)
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_aggregate_over_matching_rows() {
        let pool = seeded_pool().await;
        let filter = PriceFilter {
            range: DateRange::new(Some(date(2020, 1, 2)), Some(date(2020, 1, 3))),
            ..Default::default()
        };
        let metrics = fetch_aggregate(&pool, "AAPL", &filter).await.unwrap().unwrap();

        assert_eq!(metrics.avg_price, Some(11.25));
        assert_eq!(metrics.max_close, Some(12.0));
        assert_eq!(metrics.min_close, Some(11.0));
        assert_eq!(metrics.avg_volume, Some(200.0));
    }

    #[tokio::test]
    async fn test_aggregate_empty_is_none() {
        let pool = seeded_pool().await;
        assert!(fetch_aggregate(&pool, "NOPE", &PriceFilter::default()).await.unwrap().is_none());

        let disjoint = PriceFilter {
            range: DateRange::new(Some(date(2030, 1, 1)), None),
            ..Default::default()
        };
        assert!(fetch_aggregate(&pool, "AAPL", &disjoint).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consolidated_orders_by_ticker_then_date() {
        let pool = seeded_pool().await;
        let range = DateRange::new(None, Some(date(2020, 1, 3)));
        let rows = fetch_consolidated(&pool, None, &range).await.unwrap();

        let keys: Vec<_> = rows.iter().map(|r| (r.ticker.as_str(), r.date)).collect();
        assert_eq!(
            keys,
            vec![
                ("AAPL", date(2020, 1, 2)),
                ("AAPL", date(2020, 1, 3)),
                ("MSFT", date(2020, 1, 2)),
            ]
        );

        let only_msft = fetch_consolidated(&pool, Some("msft"), &DateRange::default()).await.unwrap();
        assert_eq!(only_msft.len(), 1);
        assert_eq!(only_msft[0].avg_price, Some(100.5));
    }
}
