//! Cart Aggregate

use rust_decimal::Decimal;

use crate::domain::pricing::{effective_unit_price, line_total};
use crate::domain::value_objects::ProductId;
use crate::{CartLine, LineKey};

#[derive(Clone, Debug, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> { self.lines.iter().find(|l| l.matches(key)) }
    pub fn quantity_of(&self, key: &LineKey) -> u32 { self.line(key).map_or(0, |l| l.quantity) }

    /// Sum of all line quantities.
    pub fn item_count(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }

    pub fn replace(&mut self, lines: Vec<CartLine>) { self.lines = lines; }

    /// Merges into an existing line for the same product and size, else appends.
    pub fn add_line(&mut self, line: CartLine) {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.matches(&line.key())) {
            existing.quantity += line.quantity;
        } else {
            self.lines.push(line);
        }
    }

    /// Quantity 0 deletes the line.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return self.remove_line(key); }
        let line = self.lines.iter_mut().find(|l| l.matches(key)).ok_or(CartError::LineNotFound)?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_line(&mut self, key: &LineKey) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| !l.matches(key));
        if self.lines.len() == before { return Err(CartError::LineNotFound); }
        Ok(())
    }

    pub fn clear(&mut self) { self.lines.clear(); }

    /// Σ effective unit price × quantity, with `catalog_price` supplying the
    /// middle tier of the price fallback.
    pub fn subtotal(&self, catalog_price: impl Fn(&ProductId) -> Option<Decimal>) -> Decimal {
        self.lines.iter().fold(Decimal::ZERO, |acc, l| {
            let unit = effective_unit_price(l.final_price, catalog_price(&l.product_id), l.price);
            acc + line_total(unit, l.quantity)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { LineNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Cart item not found") }
}
