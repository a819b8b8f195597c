//! Concrete NLU engine clients.

pub mod dialogflow;
pub mod rasa;

pub use dialogflow::DialogflowEngine;
pub use rasa::RasaEngine;
