use crate::constants::ROBOTS_TXT;

pub async fn robots_txt() -> &'static str {
    ROBOTS_TXT
}
