//! Hardware-facing layers: the mailbox codec and the FlexCAN register
//! boundary built on top of it.
pub mod mailbox;
pub mod peripheral;
