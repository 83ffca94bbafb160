pub mod ad_slots;
pub mod archiveless;
pub mod campaigns;
pub mod error;
pub mod manager;
pub mod pixel;
pub mod repos;
pub mod slot_content;
pub mod visibility;
