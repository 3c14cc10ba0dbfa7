// src/ingest/mod.rs

//! Admin-side content ingestion: office documents into stored PDFs, and
//! CSV files into questions.

pub mod csv_import;
pub mod document;
