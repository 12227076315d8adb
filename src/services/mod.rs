pub mod batch_import_service;
pub mod csv_import_service;
pub mod intent_service;
pub mod llm_service;
pub mod price_service;
pub mod qa_service;
