//! `cargoflow-clients` — client (shipper) directory.

pub mod client;

pub use client::{
    ArchiveClient, Client, ClientCommand, ClientEvent, ClientStatus, ContactInfo, RegisterClient,
    UpdateClientDetails,
};
