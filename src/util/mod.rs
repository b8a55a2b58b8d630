pub mod i18n;
pub mod paths;
pub mod url_list;
