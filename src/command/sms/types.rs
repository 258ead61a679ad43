use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, AtatEnum)]
pub enum MessageFormat {
    /// 0 (default): PDU mode
    Pdu = 0,
    /// 1: Text mode
    Text = 1,
}
