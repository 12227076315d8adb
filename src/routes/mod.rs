pub mod ask;
pub mod consolidated;
pub mod health;
pub mod imports;
pub mod prices;
pub mod tickers;
