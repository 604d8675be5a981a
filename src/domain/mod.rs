// Domain 層：核心模型與 ports (介面)，這裡不做 I/O

pub mod model;
pub mod ports;
