mod item_catalog;

pub use item_catalog::ItemCatalog;
