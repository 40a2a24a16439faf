use std::collections::HashMap;

use compact_str::CompactString;
use rust_decimal::Decimal;

use super::CartItem;
use crate::currency::{
    ADA_DECIMALS, ADA_SYMBOL, Currency, CurrencyKey, DEFAULT_TOKEN_DECIMALS, format_amount,
    token_symbol,
};
use crate::model::{OrderGroupInput, OrderItemInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrencyKind {
    Ada,
    Token,
}

/// Cart lines sharing one payment currency. Becomes exactly one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyGroup {
    pub key: CurrencyKey,
    pub kind: CurrencyKind,
    pub symbol: String,
    pub decimals: u8,
    pub policy_id: Option<CompactString>,
    pub asset_name: Option<CompactString>,
    pub items: Vec<CartItem>,
    pub subtotal: u64,
    pub item_count: u32,
}

impl CurrencyGroup {
    fn open(first: &CartItem) -> Self {
        let key = first.currency_key();
        let token = first.product.supported_token.as_ref();
        let (kind, symbol, decimals) = match key {
            CurrencyKey::Ada => (CurrencyKind::Ada, ADA_SYMBOL.to_string(), ADA_DECIMALS),
            CurrencyKey::Token(_) => (
                CurrencyKind::Token,
                token.map_or_else(|| token_symbol(None, None), |t| t.symbol()),
                token.map_or(DEFAULT_TOKEN_DECIMALS, |t| t.decimals),
            ),
        };
        Self {
            key,
            kind,
            symbol,
            decimals,
            policy_id: token.map(|t| t.policy_id.clone()),
            asset_name: token.map(|t| t.asset_name.clone()),
            items: Vec::new(),
            subtotal: 0,
            item_count: 0,
        }
    }

    fn push(&mut self, item: &CartItem) {
        self.subtotal = self.subtotal.saturating_add(item.subtotal());
        self.item_count = self.item_count.saturating_add(item.quantity);
        self.items.push(item.clone());
    }

    /// Ledger currency of the group; `None` for a token without metadata.
    pub fn currency(&self) -> Option<Currency> {
        match (self.kind, &self.policy_id, &self.asset_name) {
            (CurrencyKind::Ada, _, _) => Some(Currency::Ada),
            (CurrencyKind::Token, Some(policy_id), Some(asset_name)) => Some(Currency::Token {
                policy_id: policy_id.clone(),
                asset_name: asset_name.clone(),
            }),
            _ => None,
        }
    }

    pub fn display_subtotal(&self) -> Result<Decimal, rust_decimal::Error> {
        format_amount(self.subtotal, self.decimals)
    }

    pub fn to_order_group(&self) -> OrderGroupInput {
        OrderGroupInput {
            items: self
                .items
                .iter()
                .map(|item| OrderItemInput {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.product.price,
                    token_id: item.product.token_id,
                })
                .collect(),
            token_id: self.key.token_id(),
        }
    }
}

/// Currency groups in the order their currency first appears in the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrencyGroups {
    groups: Vec<CurrencyGroup>,
    index: HashMap<CurrencyKey, usize>,
}

impl CurrencyGroups {
    pub fn get(&self, key: &CurrencyKey) -> Option<&CurrencyGroup> {
        self.index.get(key).map(|&i| &self.groups[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CurrencyGroup> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CurrencyKey> {
        self.groups.iter().map(|g| &g.key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_items(&self) -> u32 {
        self.groups
            .iter()
            .fold(0u32, |acc, g| acc.saturating_add(g.item_count))
    }

    pub fn to_order_groups(&self) -> Vec<OrderGroupInput> {
        self.groups.iter().map(CurrencyGroup::to_order_group).collect()
    }
}

impl<'a> IntoIterator for &'a CurrencyGroups {
    type Item = &'a CurrencyGroup;
    type IntoIter = std::slice::Iter<'a, CurrencyGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Partition cart lines by payment currency.
///
/// Every line lands in exactly one group and the group subtotals add up to
/// the cart subtotal. An empty cart yields no groups.
pub fn group_by_currency(items: &[CartItem]) -> CurrencyGroups {
    let mut groups = CurrencyGroups::default();
    for item in items {
        let key = item.currency_key();
        let i = match groups.index.get(&key) {
            Some(&i) => i,
            None => {
                groups.index.insert(key, groups.groups.len());
                groups.groups.push(CurrencyGroup::open(item));
                groups.groups.len() - 1
            }
        };
        groups.groups[i].push(item);
    }
    groups
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::cart::ProductSnapshot;
    use crate::currency::TokenDescriptor;

    fn descriptor(display_name: Option<&str>, asset_name: &str, decimals: u8) -> TokenDescriptor {
        TokenDescriptor {
            id: Uuid::new_v4(),
            policy_id: "f0ff48bbb7bbe9d59a40f1ce90e9e9d0ff5002ec48f232b49ca0fb9a".into(),
            asset_name: asset_name.into(),
            display_name: display_name.map(Into::into),
            decimals,
        }
    }

    fn line(price: u64, quantity: u32, token: Option<&TokenDescriptor>) -> CartItem {
        CartItem::new(
            ProductSnapshot {
                id: Uuid::new_v4(),
                name: "Item".to_string(),
                price,
                token_id: token.map(|t| t.id),
                stock: 100,
                supported_token: token.cloned(),
            },
            quantity,
        )
    }

    #[test]
    fn test_every_line_in_one_group_and_totals_add_up() {
        let hosky = descriptor(None, "484f534b59", 0);
        let min = descriptor(Some("MIN"), "4d494e", 6);
        let items = vec![
            line(1_000_000, 2, None),
            line(500, 3, Some(&hosky)),
            line(2_500_000, 1, None),
            line(7, 4, Some(&min)),
            line(100, 1, Some(&hosky)),
        ];

        let groups = group_by_currency(&items);

        let cart_total: u64 = items.iter().map(CartItem::subtotal).sum();
        let grouped_total: u64 = groups.iter().map(|g| g.subtotal).sum();
        assert_eq!(cart_total, grouped_total);

        let grouped_lines: usize = groups.iter().map(|g| g.items.len()).sum();
        assert_eq!(grouped_lines, items.len());
        for item in &items {
            let holders = groups
                .iter()
                .filter(|g| g.items.iter().any(|i| i.product_id == item.product_id))
                .count();
            assert_eq!(holders, 1);
        }

        assert_eq!(
            groups.keys().cloned().collect::<Vec<_>>(),
            vec![CurrencyKey::Ada, hosky.key(), min.key()]
        );
        assert_eq!(groups.total_items(), 11);
    }

    #[test]
    fn test_group_metadata() {
        let hosky = descriptor(None, "484f534b59", 0);
        let groups = group_by_currency(&[line(1_500_000, 1, None), line(500, 2, Some(&hosky))]);

        let ada = groups.get(&CurrencyKey::Ada).unwrap();
        assert_eq!(ada.kind, CurrencyKind::Ada);
        assert_eq!(ada.symbol, "₳");
        assert_eq!(ada.display_subtotal().unwrap().to_string(), "1.500000");
        assert_eq!(ada.currency(), Some(Currency::Ada));

        let token = groups.get(&hosky.key()).unwrap();
        assert_eq!(token.kind, CurrencyKind::Token);
        assert_eq!(token.symbol, "HOSKY");
        assert_eq!(token.decimals, 0);
        assert_eq!(token.item_count, 2);
        assert_eq!(token.to_order_group().token_id, Some(hosky.id));
    }

    #[test]
    fn test_token_line_without_descriptor_falls_back() {
        let mut item = line(10, 1, None);
        item.product.token_id = Some(Uuid::new_v4());
        let groups = group_by_currency(&[item]);
        let group = groups.iter().next().unwrap();
        assert_eq!(group.symbol, "Token");
        assert_eq!(group.decimals, DEFAULT_TOKEN_DECIMALS);
        assert!(group.currency().is_none());
    }

    #[test]
    fn test_empty_cart_has_no_groups() {
        assert!(group_by_currency(&[]).is_empty());
    }
}
