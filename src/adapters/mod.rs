// Adapters 層：外部系統的具體實作 (places HTTP API、儲存、輸出檔案)

pub mod google_places;
pub mod sink;
pub mod storage;
