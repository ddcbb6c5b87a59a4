mod common;

mod import_admission;
mod reconciliation;
