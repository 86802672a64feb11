//! Catalog Aggregate

use rust_decimal::Decimal;
use std::cmp::Reverse;

use crate::domain::value_objects::ProductId;
use crate::Product;

/// Products as last fetched from the backend, in backend order.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self { Self { products } }

    pub fn products(&self) -> &[Product] { &self.products }
    pub fn len(&self) -> usize { self.products.len() }
    pub fn is_empty(&self) -> bool { self.products.is_empty() }

    pub fn get(&self, id: &ProductId) -> Option<&Product> { self.products.iter().find(|p| &p.id == id) }
    pub fn price_of(&self, id: &ProductId) -> Option<Decimal> { self.get(id).map(|p| p.price) }

    pub fn replace(&mut self, products: Vec<Product>) { self.products = products; }

    /// Adopts a server-reported stock value. Returns `false` for unknown products.
    pub fn adopt_stock(&mut self, id: &ProductId, stock: u32) -> bool {
        match self.products.iter_mut().find(|p| &p.id == id) {
            Some(product) => { product.stock = stock; true }
            None => false,
        }
    }

    /// Optimistic local check; the backend re-validates every mutation.
    pub fn has_stock(&self, id: &ProductId, needed: u32) -> bool {
        self.get(id).is_some_and(|p| p.stock >= needed)
    }

    /// Case-insensitive name match. An empty query returns everything.
    pub fn search(&self, query: &str) -> Vec<&Product> {
        let needle = query.trim().to_lowercase();
        self.products.iter().filter(|p| needle.is_empty() || p.name.to_lowercase().contains(&needle)).collect()
    }

    pub fn bestsellers(&self) -> Vec<&Product> { self.products.iter().filter(|p| p.bestseller).collect() }

    /// Newest first; undated products sort last, keeping backend order among equals.
    pub fn latest(&self, limit: usize) -> Vec<&Product> {
        let mut sorted: Vec<&Product> = self.products.iter().collect();
        sorted.sort_by_key(|p| Reverse(p.date_added));
        sorted.truncate(limit);
        sorted
    }
}
