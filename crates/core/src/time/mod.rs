pub mod market_day;
