pub(crate) mod check;
pub(crate) mod classify;
pub(crate) mod evaluate;
pub(crate) mod interpret;
