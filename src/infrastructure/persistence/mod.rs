pub mod training_journal;

pub use training_journal::CsvTrainingJournal;
