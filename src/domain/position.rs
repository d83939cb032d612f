//! Read-only view of a position held by the external portfolio.

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub instrument: String,
    pub quantity: i64,
    pub average_price: f64,
    pub current_price: f64,
}

impl Holding {
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn market_value(&self) -> f64 {
        self.quantity as f64 * self.current_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.quantity as f64 * (self.current_price - self.average_price)
    }

    /// (current - average) / average, or 0 when the average price is 0.
    pub fn profit_ratio(&self) -> f64 {
        if self.average_price == 0.0 {
            return 0.0;
        }
        let r = (self.current_price - self.average_price) / self.average_price;
        if r.is_finite() { r } else { 0.0 }
    }
}
