//! Transaction messages

use crate::{Address, Coins, StdError, StdResult};
use serde::{Deserialize, Serialize};

/// Every message kind the ledger understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum Msg {
    #[serde(rename = "/bank.MsgSend")]
    Send(MsgSend),
    #[serde(rename = "/bank.MsgMultiSend")]
    MultiSend(MsgMultiSend),
    #[serde(rename = "/vm.m_addpkg")]
    AddPackage(MsgAddPackage),
    #[serde(rename = "/vm.m_call")]
    Call(MsgCall),
    #[serde(rename = "/vm.m_eval")]
    Eval(MsgEval),
}

impl Msg {
    /// Name of the module handling this message
    pub fn route(&self) -> &'static str {
        match self {
            Msg::Send(_) | Msg::MultiSend(_) => "bank",
            Msg::AddPackage(_) | Msg::Call(_) | Msg::Eval(_) => "vm",
        }
    }

    pub fn msg_type(&self) -> &'static str {
        match self {
            Msg::Send(_) => "send",
            Msg::MultiSend(_) => "multisend",
            Msg::AddPackage(_) => "add_package",
            Msg::Call(_) => "exec",
            Msg::Eval(_) => "eval",
        }
    }

    /// Addresses that must sign a transaction carrying this message
    pub fn signers(&self) -> Vec<Address> {
        match self {
            Msg::Send(msg) => vec![msg.from_address],
            Msg::MultiSend(msg) => msg.inputs.iter().map(|input| input.address).collect(),
            Msg::AddPackage(msg) => vec![msg.creator],
            Msg::Call(msg) => vec![msg.caller],
            Msg::Eval(msg) => vec![msg.caller],
        }
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> StdResult<()> {
        match self {
            Msg::Send(msg) => msg.validate_basic(),
            Msg::MultiSend(msg) => msg.validate_basic(),
            Msg::AddPackage(msg) => msg.validate_basic(),
            Msg::Call(msg) => msg.validate_basic(),
            Msg::Eval(msg) => msg.validate_basic(),
        }
    }
}

fn require_address(addr: &Address, field: &str) -> StdResult<()> {
    if addr.is_zero() {
        return Err(StdError::InvalidAddress(format!("missing {field} address")));
    }
    Ok(())
}

fn require_positive_coins(coins: &Coins) -> StdResult<()> {
    coins.validate()?;
    if !coins.is_all_positive() {
        return Err(StdError::InsufficientCoins(coins.to_string()));
    }
    Ok(())
}

/// Transfer coins between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    pub from_address: Address,
    pub to_address: Address,
    pub amount: Coins,
}

impl MsgSend {
    pub fn new(from_address: Address, to_address: Address, amount: Coins) -> Self {
        Self {
            from_address,
            to_address,
            amount,
        }
    }

    pub fn validate_basic(&self) -> StdResult<()> {
        require_address(&self.from_address, "sender")?;
        require_address(&self.to_address, "recipient")?;
        require_positive_coins(&self.amount)
    }
}

/// One debited account of a multi-send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub address: Address,
    pub coins: Coins,
}

impl Input {
    pub fn new(address: Address, coins: Coins) -> Self {
        Self { address, coins }
    }

    pub fn validate_basic(&self) -> StdResult<()> {
        require_address(&self.address, "input")?;
        require_positive_coins(&self.coins)
    }
}

/// One credited account of a multi-send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub address: Address,
    pub coins: Coins,
}

impl Output {
    pub fn new(address: Address, coins: Coins) -> Self {
        Self { address, coins }
    }

    pub fn validate_basic(&self) -> StdResult<()> {
        require_address(&self.address, "output")?;
        require_positive_coins(&self.coins)
    }
}

/// Check inputs and outputs individually and that they balance
pub fn validate_inputs_outputs(inputs: &[Input], outputs: &[Output]) -> StdResult<()> {
    if inputs.is_empty() {
        return Err(StdError::NoInputs);
    }
    if outputs.is_empty() {
        return Err(StdError::NoOutputs);
    }

    let mut total_in = Coins::default();
    for input in inputs {
        input.validate_basic()?;
        total_in = total_in.checked_add(&input.coins)?;
    }
    let mut total_out = Coins::default();
    for output in outputs {
        output.validate_basic()?;
        total_out = total_out.checked_add(&output.coins)?;
    }

    if !total_in.is_equal(&total_out) {
        return Err(StdError::InputOutputMismatch);
    }
    Ok(())
}

/// Many-to-many transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMultiSend {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl MsgMultiSend {
    pub fn validate_basic(&self) -> StdResult<()> {
        validate_inputs_outputs(&self.inputs, &self.outputs)
    }
}

/// A single source file of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemFile {
    pub name: String,
    pub body: String,
}

/// An in-memory package: a path and its files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemPackage {
    pub name: String,
    pub path: String,
    pub files: Vec<MemFile>,
}

impl MemPackage {
    pub fn validate(&self) -> StdResult<()> {
        if self.path.is_empty() {
            return Err(StdError::InvalidPkgPath("missing package path".to_string()));
        }
        if self.name.is_empty() {
            return Err(StdError::InvalidPkgPath(format!(
                "missing package name for {}",
                self.path
            )));
        }
        if self.files.is_empty() {
            return Err(StdError::InvalidPkgPath(format!("package {} has no files", self.path)));
        }
        for (i, file) in self.files.iter().enumerate() {
            if file.name.is_empty() || file.name.contains('/') {
                return Err(StdError::InvalidPkgPath(format!("invalid file name {:?}", file.name)));
            }
            if self.files[..i].iter().any(|f| f.name == file.name) {
                return Err(StdError::InvalidPkgPath(format!("duplicate file name {}", file.name)));
            }
        }
        Ok(())
    }

    pub fn get_file(&self, name: &str) -> Option<&MemFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Publish a package, optionally funding its address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddPackage {
    pub creator: Address,
    pub package: MemPackage,
    pub deposit: Coins,
}

impl MsgAddPackage {
    pub fn validate_basic(&self) -> StdResult<()> {
        require_address(&self.creator, "creator")?;
        self.package.validate()?;
        self.deposit.validate()
    }
}

/// Call an exported function of a realm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCall {
    pub caller: Address,
    pub send: Coins,
    pub pkg_path: String,
    pub func: String,
    pub args: Vec<String>,
}

impl MsgCall {
    pub fn validate_basic(&self) -> StdResult<()> {
        require_address(&self.caller, "caller")?;
        if self.pkg_path.is_empty() {
            return Err(StdError::InvalidPkgPath("missing package path".to_string()));
        }
        if self.func.is_empty() {
            return Err(StdError::InvalidExpr("missing function to call".to_string()));
        }
        self.send.validate()
    }
}

/// Evaluate an expression in the scope of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgEval {
    pub caller: Address,
    pub send: Coins,
    pub pkg_path: String,
    pub expr: String,
}

impl MsgEval {
    pub fn validate_basic(&self) -> StdResult<()> {
        require_address(&self.caller, "caller")?;
        if self.pkg_path.is_empty() {
            return Err(StdError::InvalidPkgPath("missing package path".to_string()));
        }
        if self.expr.trim().is_empty() {
            return Err(StdError::InvalidExpr("missing expression to evaluate".to_string()));
        }
        self.send.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_coins;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    #[test]
    fn test_msg_send_validate_basic() {
        let msg = MsgSend::new(addr(1), addr(2), parse_coins("10foocoin").unwrap());
        assert!(msg.validate_basic().is_ok());

        let empty = MsgSend::new(addr(1), addr(2), Coins::default());
        assert!(matches!(
            empty.validate_basic(),
            Err(StdError::InsufficientCoins(_))
        ));

        let no_sender = MsgSend::new(Address::zero(), addr(2), parse_coins("1foo").unwrap());
        assert!(matches!(
            no_sender.validate_basic(),
            Err(StdError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_inputs_outputs_must_balance() {
        let coins = parse_coins("10atom").unwrap();
        let inputs = vec![Input::new(addr(1), coins.clone())];
        let outputs = vec![Output::new(addr(2), coins)];
        assert!(validate_inputs_outputs(&inputs, &outputs).is_ok());

        let short = vec![Output::new(addr(2), parse_coins("9atom").unwrap())];
        assert_eq!(
            validate_inputs_outputs(&inputs, &short),
            Err(StdError::InputOutputMismatch)
        );
        assert_eq!(validate_inputs_outputs(&[], &outputs), Err(StdError::NoInputs));
        assert_eq!(validate_inputs_outputs(&inputs, &[]), Err(StdError::NoOutputs));
    }

    #[test]
    fn test_inputs_overflow_is_an_error() {
        let max = parse_coins("9223372036854775807foo").unwrap();
        let inputs = vec![Input::new(addr(1), max.clone()), Input::new(addr(2), max.clone())];
        let outputs = vec![Output::new(addr(3), max)];
        assert!(matches!(
            validate_inputs_outputs(&inputs, &outputs),
            Err(StdError::InvalidCoins(_))
        ));
    }

    #[test]
    fn test_signers_and_routes() {
        let msg = Msg::MultiSend(MsgMultiSend {
            inputs: vec![
                Input::new(addr(1), parse_coins("1atom").unwrap()),
                Input::new(addr(3), parse_coins("1atom").unwrap()),
            ],
            outputs: vec![Output::new(addr(2), parse_coins("2atom").unwrap())],
        });
        assert_eq!(msg.signers(), vec![addr(1), addr(3)]);
        assert_eq!(msg.route(), "bank");

        let call = Msg::Call(MsgCall {
            caller: addr(4),
            send: Coins::default(),
            pkg_path: "gno.land/r/demo".to_string(),
            func: "Hello".to_string(),
            args: vec![],
        });
        assert_eq!(call.route(), "vm");
        assert_eq!(call.signers(), vec![addr(4)]);
    }

    #[test]
    fn test_mem_package_validation() {
        let mut pkg = MemPackage {
            name: "demo".to_string(),
            path: "gno.land/r/demo".to_string(),
            files: vec![MemFile {
                name: "demo.gno".to_string(),
                body: "package demo".to_string(),
            }],
        };
        assert!(pkg.validate().is_ok());
        pkg.files.push(pkg.files[0].clone());
        assert!(pkg.validate().is_err());
        pkg.files.clear();
        assert!(pkg.validate().is_err());
    }

    #[test]
    fn test_msg_json_is_tagged() {
        let msg = Msg::Send(MsgSend::new(addr(1), addr(2), parse_coins("5foo").unwrap()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["@type"], "/bank.MsgSend");
        assert_eq!(json["amount"], "5foo");
    }
}
