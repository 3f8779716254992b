pub mod export;
pub mod figures;
pub mod summary_txt;
pub mod svg;
