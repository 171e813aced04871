//! 外部入口：通用 Webhook（POST /trigger）与 WhatsApp Cloud API（需 feature `whatsapp` 与公网 Webhook 域名）

#[cfg(feature = "whatsapp")]
pub mod webhook;

#[cfg(feature = "whatsapp")]
pub mod whatsapp;
