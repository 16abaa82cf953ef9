pub mod currency;
pub mod ocr;
pub mod phrasebook;
pub mod speech;
pub mod translation;

// Re-export commonly used services
pub use currency::{CurrencyConverter, FrankfurterClient};
pub use ocr::{TesseractRecognizer, TextRecognizer};
pub use phrasebook::PhraseBook;
pub use speech::{GoogleTtsClient, SpeechSynthesizer};
pub use translation::{CachedTranslator, LibreTranslateClient, TranslationCache, Translator};
