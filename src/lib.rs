// Time source
pub mod clock;

// Respawn policies and next-spawn computation
pub mod policy;

// Entity definitions and catalog loading
pub mod catalog;

// Per-instance entity state and reconciliation
pub mod state;

// Kill/collect actions and their log records
pub mod action;

// Instance reservation countdown
pub mod reservation;

// Versioned instance documents
pub mod snapshot;

// Document, action log and session storage
pub mod store;

// Configuration
pub mod config;

// Instance tracker (storage + core glue)
pub mod tracker;

// Console front-end
pub mod console;
