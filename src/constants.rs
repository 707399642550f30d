pub const PAGE_SIZE: i64 = 6;

pub const MAX_LEN_EMAIL: usize = 254;
pub const MAX_LEN_USERNAME: usize = 150;
pub const MAX_LEN_NAME_RECIPE: usize = 150;

pub const RESERVED_USERNAMES: &[&str] = &["me"];

pub const SHORT_CODE_LEN: usize = 8;
pub const SHORT_LINK_PREFIX: &str = "/s/";

pub const MEDIA_ROOT: &str = "media";
pub const MEDIA_URL: &str = "/media/";

pub const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;
