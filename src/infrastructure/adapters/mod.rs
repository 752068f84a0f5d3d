pub mod in_memory_sale_repository;
pub mod mysql_sale_repository;
pub mod zenopay_adapter;

pub use in_memory_sale_repository::InMemorySaleRepository;
pub use mysql_sale_repository::MySqlSaleRepository;
pub use zenopay_adapter::ZenoPayAdapter;
