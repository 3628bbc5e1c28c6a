//! Transaction admission
//!
//! The ante handler runs before any message of a transaction. In order it
//! enforces the mempool fee floor, installs the gas meter, checks the
//! signature count and the envelope, charges for the transaction size,
//! checks the memo, deducts the fee from the first signer and finally
//! verifies every signature, bumping each signer's sequence.

use crate::{AccountKeeper, CoinSender, Params};
use chain_core::{
    sign_bytes, Account, Address, BasicGasMeter, Coins, Context, Fee, Gas, GasMeter,
    InfiniteGasMeter, Multisignature, PubKey, PubKeyMultisigThreshold, PubKeySecp256k1,
    Signature, StdError, StdResult, Tx, TxResult,
};
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::{debug, warn};

static FEE_COLLECTOR: Lazy<Address> = Lazy::new(|| Address::from_preimage(b"fee_collector"));

// Stands in for a signer without a known public key during simulation.
static SIM_SECP256K1_PUBKEY: Lazy<PubKey> = Lazy::new(|| {
    let mut key = [0u8; 33];
    hex::decode_to_slice(
        "035AD6810A47F073553FF30D2FCC7E0D3B1C0B74B61A1AAA2582344037151E143A",
        &mut key,
    )
    .expect("simulation pubkey is valid hex");
    PubKey::Secp256k1(PubKeySecp256k1(key))
});

const SIM_SECP256K1_SIG: [u8; 64] = [0u8; 64];

/// Address collecting transaction fees
pub fn fee_collector_address() -> Address {
    *FEE_COLLECTOR
}

/// Charges the gas for verifying one signature made by `pubkey`
pub type SignatureVerificationGasConsumer =
    fn(&mut dyn GasMeter, &[u8], &PubKey, &Params) -> StdResult<()>;

/// Behaviour switches for the ante handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnteOptions {
    /// Verify signatures of transactions at block height zero
    pub verify_genesis_signatures: bool,
    pub fee_collector: Address,
}

impl Default for AnteOptions {
    fn default() -> Self {
        Self {
            verify_genesis_signatures: true,
            fee_collector: fee_collector_address(),
        }
    }
}

/// What the ante handler hands back to the transaction driver
#[derive(Debug, Clone)]
pub struct AnteOutcome {
    /// Context carrying the transaction's gas meter
    pub ctx: Context,
    pub result: TxResult,
    /// Stop processing the transaction
    pub abort: bool,
}

impl AnteOutcome {
    fn aborted(ctx: Context, result: TxResult) -> Self {
        Self {
            ctx,
            result,
            abort: true,
        }
    }
}

/// Gatekeeper run before every transaction
#[derive(Clone)]
pub struct AnteHandler {
    ak: Arc<dyn AccountKeeper>,
    bank: Arc<dyn CoinSender>,
    sig_gas_consumer: SignatureVerificationGasConsumer,
    options: AnteOptions,
}

impl AnteHandler {
    pub fn new(
        ak: Arc<dyn AccountKeeper>,
        bank: Arc<dyn CoinSender>,
        sig_gas_consumer: SignatureVerificationGasConsumer,
        options: AnteOptions,
    ) -> Self {
        Self {
            ak,
            bank,
            sig_gas_consumer,
            options,
        }
    }

    pub fn options(&self) -> &AnteOptions {
        &self.options
    }

    /// Run every admission check on `tx`
    pub fn handle(&self, ctx: &Context, tx: &Tx, simulate: bool) -> AnteOutcome {
        if ctx.is_check_tx() && !simulate {
            if let Err(err) = ensure_sufficient_mempool_fees(ctx, &tx.fee) {
                debug!("Rejected tx below the mempool fee floor: {}", err);
                return AnteOutcome::aborted(ctx.clone(), err.into());
            }
        }

        let new_ctx = set_gas_meter(simulate, ctx, tx.fee.gas_wanted);

        match self.run(&new_ctx, tx, simulate) {
            Ok(()) => AnteOutcome {
                ctx: new_ctx,
                result: TxResult {
                    gas_wanted: tx.fee.gas_wanted,
                    ..TxResult::ok()
                },
                abort: false,
            },
            Err(StdError::OutOfGas { descriptor }) => {
                let gas_used = new_ctx.gas_consumed();
                let log = format!(
                    "out of gas in location: {}; gasWanted: {}, gasUsed: {}",
                    descriptor, tx.fee.gas_wanted, gas_used
                );
                warn!("{}", log);
                let result = TxResult {
                    error: Some(StdError::OutOfGas { descriptor }),
                    log,
                    data: Vec::new(),
                    gas_wanted: tx.fee.gas_wanted,
                    gas_used,
                };
                AnteOutcome::aborted(new_ctx, result)
            }
            Err(err) => {
                debug!("Ante handler rejected tx: {}", err);
                AnteOutcome::aborted(new_ctx, err.into())
            }
        }
    }

    fn run(&self, ctx: &Context, tx: &Tx, simulate: bool) -> StdResult<()> {
        let params = ctx.value::<Params>().cloned().unwrap_or_default();

        validate_sig_count(tx, &params)?;
        tx.validate_basic()?;

        ctx.consume_gas(
            params.tx_size_cost_per_byte * ctx.tx_bytes().len() as Gas,
            "txSize",
        )?;

        validate_memo(tx, &params)?;

        let signers = tx.signers();
        let first = signers.first().ok_or(StdError::NoSignatures)?;

        let mut fee_payer = get_signer_acc(ctx, self.ak.as_ref(), first)?;
        if !tx.fee.gas_fee.is_zero() {
            let fees = Coins::raw(vec![tx.fee.gas_fee.clone()]);
            deduct_fees(
                self.bank.as_ref(),
                ctx,
                &fee_payer,
                &fees,
                self.options.fee_collector,
            )?;
            fee_payer = get_signer_acc(ctx, self.ak.as_ref(), first)?;
        }

        let is_genesis = ctx.block_height() == 0;
        for (i, sig) in tx.signatures.iter().enumerate() {
            let acc = if i == 0 {
                fee_payer.clone()
            } else {
                get_signer_acc(ctx, self.ak.as_ref(), &signers[i])?
            };

            if is_genesis && !self.options.verify_genesis_signatures {
                self.ak.set_account(ctx, acc);
                continue;
            }

            let sign_bytes = get_sign_bytes(ctx.chain_id(), tx, &acc, is_genesis)?;
            let acc = process_sig(
                ctx,
                acc,
                sig,
                &sign_bytes,
                simulate,
                &params,
                self.sig_gas_consumer,
            )?;
            debug!("Verified signature of {} at sequence {}", acc.address, acc.sequence);
            self.ak.set_account(ctx, acc);
        }

        Ok(())
    }
}

/// Fetch the account of a required signer
pub fn get_signer_acc(ctx: &Context, ak: &dyn AccountKeeper, addr: &Address) -> StdResult<Account> {
    ak.get_account(ctx, addr)
        .ok_or_else(|| StdError::UnknownAddress(format!("account {} does not exist", addr)))
}

/// Reject transactions carrying more leaf keys than `tx_sig_limit`
pub fn validate_sig_count(tx: &Tx, params: &Params) -> StdResult<()> {
    let mut sig_count = 0;
    for sig in &tx.signatures {
        sig_count += sig.pub_key.as_ref().map_or(1, PubKey::count_sub_keys);
        if sig_count > params.tx_sig_limit {
            return Err(StdError::TooManySignatures(format!(
                "signatures: {}, limit: {}",
                sig_count, params.tx_sig_limit
            )));
        }
    }
    Ok(())
}

pub fn validate_memo(tx: &Tx, params: &Params) -> StdResult<()> {
    let memo_length = tx.memo.len();
    if memo_length > params.max_memo_characters {
        return Err(StdError::MemoTooLarge(format!(
            "maximum number of characters is {} but received {} characters",
            params.max_memo_characters, memo_length
        )));
    }
    Ok(())
}

/// Resolve the key to verify with: the account's stored key, else the one
/// supplied with the signature (which must match the account address).
/// Simulation falls back to a fixed dummy key.
pub fn process_pub_key(acc: &Account, sig: &Signature, simulate: bool) -> StdResult<PubKey> {
    if simulate {
        return Ok(acc
            .pub_key
            .clone()
            .unwrap_or_else(|| SIM_SECP256K1_PUBKEY.clone()));
    }
    if let Some(pub_key) = &acc.pub_key {
        return Ok(pub_key.clone());
    }

    let pub_key = sig
        .pub_key
        .clone()
        .ok_or_else(|| StdError::InvalidPubKey("PubKey not found".to_string()))?;
    if pub_key.address() != acc.address {
        return Err(StdError::InvalidPubKey(format!(
            "PubKey does not match Signer address {}",
            acc.address
        )));
    }
    Ok(pub_key)
}

/// Charge for and verify one signature. Returns the account with its key
/// set and its sequence incremented.
pub fn process_sig(
    ctx: &Context,
    mut acc: Account,
    sig: &Signature,
    sign_bytes: &[u8],
    simulate: bool,
    params: &Params,
    sig_gas_consumer: SignatureVerificationGasConsumer,
) -> StdResult<Account> {
    let pub_key = process_pub_key(&acc, sig, simulate)?;
    acc.pub_key = Some(pub_key.clone());

    {
        let mut meter = ctx.gas_meter().lock();
        if simulate {
            // Simulated txs carry no real signatures; charge for one here.
            consume_simulated_sig_gas(&mut **meter, &pub_key, sig, params)?;
        }
        sig_gas_consumer(&mut **meter, &sig.signature, &pub_key, params)?;
    }

    if !simulate && !pub_key.verify_bytes(sign_bytes, &sig.signature) {
        return Err(StdError::Unauthorized(
            "signature verification failed; verify correct account sequence and chain-id"
                .to_string(),
        ));
    }

    acc.increment_sequence();
    Ok(acc)
}

fn consume_simulated_sig_gas(
    meter: &mut dyn GasMeter,
    pub_key: &PubKey,
    sig: &Signature,
    params: &Params,
) -> StdResult<()> {
    let sim_sig = Signature {
        pub_key: Some(pub_key.clone()),
        signature: if sig.signature.is_empty() {
            SIM_SECP256K1_SIG.to_vec()
        } else {
            Vec::new()
        },
    };
    let sig_bz = serde_json::to_vec(&sim_sig).map_err(|e| StdError::Internal(e.to_string()))?;

    // extra bytes for the length prefixes of the envelope
    let mut cost = (sig_bz.len() + 6) as Gas;
    if matches!(pub_key, PubKey::Multisig(_)) {
        cost *= params.tx_sig_limit as Gas;
    }
    meter.consume_gas(params.tx_size_cost_per_byte * cost, "txSize")
}

/// Default gas charge per key kind. Ed25519 keys are charged and then
/// rejected; multisig keys are charged per signed member.
pub fn default_sig_verification_gas_consumer(
    meter: &mut dyn GasMeter,
    sig: &[u8],
    pub_key: &PubKey,
    params: &Params,
) -> StdResult<()> {
    match pub_key {
        PubKey::Ed25519(_) => {
            meter.consume_gas(params.sig_verify_cost_ed25519, "ante verify: ed25519")?;
            Err(StdError::InvalidPubKey(
                "ED25519 public keys are unsupported".to_string(),
            ))
        }
        PubKey::Secp256k1(_) => {
            meter.consume_gas(params.sig_verify_cost_secp256k1, "ante verify: secp256k1")
        }
        PubKey::Multisig(multi) => {
            let multisignature = Multisignature::decode(sig)?;
            consume_multisignature_verification_gas(meter, &multisignature, multi, params)
        }
    }
}

/// Walk the signed members of a multisig key, charging each one. Only an
/// out-of-gas error from a member stops the walk.
pub fn consume_multisignature_verification_gas(
    meter: &mut dyn GasMeter,
    sig: &Multisignature,
    pub_key: &PubKeyMultisigThreshold,
    params: &Params,
) -> StdResult<()> {
    if sig.bit_array.size() != pub_key.pubkeys.len() {
        return Err(StdError::Unauthorized(format!(
            "multisignature covers {} members but the key has {}",
            sig.bit_array.size(),
            pub_key.pubkeys.len()
        )));
    }
    let mut sig_index = 0;
    for i in 0..sig.bit_array.size() {
        if !sig.bit_array.get_index(i) {
            continue;
        }
        let (Some(member), Some(member_sig)) = (pub_key.pubkeys.get(i), sig.sigs.get(sig_index))
        else {
            return Err(StdError::Unauthorized(
                "multisignature does not match its public key".to_string(),
            ));
        };
        if let Err(err) = default_sig_verification_gas_consumer(meter, member_sig, member, params) {
            if err.is_out_of_gas() {
                return Err(err);
            }
        }
        sig_index += 1;
    }
    Ok(())
}

/// Move `fees` from `acc` to the fee collector
pub fn deduct_fees(
    bank: &dyn CoinSender,
    ctx: &Context,
    acc: &Account,
    fees: &Coins,
    fee_collector: Address,
) -> StdResult<()> {
    if !fees.is_valid() {
        return Err(StdError::InsufficientFee(format!("invalid fee amount: {}", fees)));
    }

    let new_coins = acc.coins.sub_unsafe(fees);
    if !new_coins.is_valid() {
        return Err(StdError::InsufficientFunds(format!(
            "insufficient funds to pay for fees; {} < {}",
            acc.coins, fees
        )));
    }

    bank.send_coins(ctx, acc.address, fee_collector, fees)?;
    debug!("Deducted fee {} from {}", fees, acc.address);
    Ok(())
}

/// Compare the fee against the node's minimum gas prices. The first minimum
/// price in the fee's denom decides; no configured prices accepts any fee.
pub fn ensure_sufficient_mempool_fees(ctx: &Context, fee: &Fee) -> StdResult<()> {
    let min_gas_prices = ctx.min_gas_prices();
    if min_gas_prices.is_empty() {
        return Ok(());
    }

    for gp in min_gas_prices {
        if gp.price.denom != fee.gas_fee.denom {
            continue;
        }
        // fee_amount / fee_gas >= price / gas, without division
        let have = fee.gas_fee.amount as i128 * gp.gas as i128;
        let want = fee.gas_wanted as i128 * gp.price.amount as i128;
        if have >= want {
            return Ok(());
        }
        return Err(StdError::InsufficientFee(format!(
            "insufficient fees; got: {} for {} gas, required gas price: {}",
            fee.gas_fee, fee.gas_wanted, gp
        )));
    }

    let required: Vec<String> = min_gas_prices.iter().map(ToString::to_string).collect();
    Err(StdError::InsufficientFee(format!(
        "insufficient fees; got: {}, required (one of): {}",
        fee.gas_fee,
        required.join(";")
    )))
}

/// Infinite meter for simulation and genesis, else bounded at `gas_limit`
pub fn set_gas_meter(simulate: bool, ctx: &Context, gas_limit: Gas) -> Context {
    if simulate || ctx.block_height() == 0 {
        ctx.clone().with_gas_meter(InfiniteGasMeter::new())
    } else {
        ctx.clone().with_gas_meter(BasicGasMeter::new(gas_limit))
    }
}

/// Sign bytes for `acc`; the account number is zero at genesis
pub fn get_sign_bytes(chain_id: &str, tx: &Tx, acc: &Account, genesis: bool) -> StdResult<Vec<u8>> {
    let account_number = if genesis { 0 } else { acc.account_number };
    sign_bytes(
        chain_id,
        account_number,
        acc.sequence,
        &tx.fee,
        &tx.msgs,
        &tx.memo,
    )
}
