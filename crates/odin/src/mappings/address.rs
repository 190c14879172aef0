//! Mappings from order addresses to resources

use std::borrow::Cow;

use catalogue_orm::{BillingAddress, Country, Database, OrmResult, Related, ShippingAddress};

use crate::error::MappingResult;
use crate::mappings::common::{FieldRule, Mapping};
use crate::mappings::context::MappingContext;
use crate::resources::{BillingAddressResource, CountryResource, ShippingAddressResource};

/// The joined country, or a lookup by id
fn country_of<'a>(country: &'a Related<Country>, country_id: i64, db: &Database) -> OrmResult<Cow<'a, Country>> {
    match country.get() {
        Some(country) => Ok(Cow::Borrowed(country)),
        None => Ok(Cow::Owned(db.get::<Country>(country_id)?)),
    }
}

pub struct CountryToResource;

impl CountryToResource {
    fn copy_fields(country: &Country, _context: &MappingContext<'_>, resource: &mut CountryResource) -> MappingResult<()> {
        *resource = CountryResource {
            iso_3166_1_a2: country.iso_3166_1_a2.clone(),
            iso_3166_1_a3: country.iso_3166_1_a3.clone(),
            iso_3166_1_numeric: country.iso_3166_1_numeric.clone(),
            printable_name: country.printable_name.clone(),
            name: country.name.clone(),
            display_order: country.display_order,
            is_shipping_country: country.is_shipping_country,
        };
        Ok(())
    }
}

impl Mapping for CountryToResource {
    type Source = Country;
    type Target = CountryResource;

    const NAME: &'static str = "CountryToResource";

    fn rules() -> &'static [FieldRule<Country, CountryResource>] {
        const RULES: &[FieldRule<Country, CountryResource>] = &[FieldRule::new(
            &[
                "iso_3166_1_a2",
                "iso_3166_1_a3",
                "iso_3166_1_numeric",
                "printable_name",
                "name",
                "display_order",
                "is_shipping_country",
            ],
            CountryToResource::copy_fields,
        )];
        RULES
    }

    fn identify(country: &Country) -> String {
        format!("Country({})", country.iso_3166_1_a2)
    }
}

pub struct BillingAddressToResource;

impl BillingAddressToResource {
    fn copy_fields(
        address: &BillingAddress,
        _context: &MappingContext<'_>,
        resource: &mut BillingAddressResource,
    ) -> MappingResult<()> {
        resource.id = address.id;
        resource.title = address.title.clone();
        resource.first_name = address.first_name.clone();
        resource.last_name = address.last_name.clone();
        resource.line1 = address.line1.clone();
        resource.line2 = address.line2.clone();
        resource.line3 = address.line3.clone();
        resource.line4 = address.line4.clone();
        resource.state = address.state.clone();
        resource.postcode = address.postcode.clone();
        Ok(())
    }

    fn country(
        address: &BillingAddress,
        context: &MappingContext<'_>,
        resource: &mut BillingAddressResource,
    ) -> MappingResult<()> {
        let country = country_of(&address.country, address.country_id, context.db)?;
        resource.country = CountryToResource::apply(&country, context)?;
        Ok(())
    }
}

impl Mapping for BillingAddressToResource {
    type Source = BillingAddress;
    type Target = BillingAddressResource;

    const NAME: &'static str = "BillingAddressToResource";

    fn rules() -> &'static [FieldRule<BillingAddress, BillingAddressResource>] {
        const RULES: &[FieldRule<BillingAddress, BillingAddressResource>] = &[
            FieldRule::new(
                &[
                    "id",
                    "title",
                    "first_name",
                    "last_name",
                    "line1",
                    "line2",
                    "line3",
                    "line4",
                    "state",
                    "postcode",
                ],
                BillingAddressToResource::copy_fields,
            ),
            FieldRule::new(&["country"], BillingAddressToResource::country),
        ];
        RULES
    }

    fn identify(address: &BillingAddress) -> String {
        format!("BillingAddress(id={:?})", address.id)
    }
}

pub struct ShippingAddressToResource;

impl ShippingAddressToResource {
    fn copy_fields(
        address: &ShippingAddress,
        _context: &MappingContext<'_>,
        resource: &mut ShippingAddressResource,
    ) -> MappingResult<()> {
        resource.id = address.id;
        resource.title = address.title.clone();
        resource.first_name = address.first_name.clone();
        resource.last_name = address.last_name.clone();
        resource.line1 = address.line1.clone();
        resource.line2 = address.line2.clone();
        resource.line3 = address.line3.clone();
        resource.line4 = address.line4.clone();
        resource.state = address.state.clone();
        resource.postcode = address.postcode.clone();
        resource.phone_number = address.phone_number.clone();
        resource.notes = address.notes.clone();
        Ok(())
    }

    fn country(
        address: &ShippingAddress,
        context: &MappingContext<'_>,
        resource: &mut ShippingAddressResource,
    ) -> MappingResult<()> {
        let country = country_of(&address.country, address.country_id, context.db)?;
        resource.country = CountryToResource::apply(&country, context)?;
        Ok(())
    }
}

impl Mapping for ShippingAddressToResource {
    type Source = ShippingAddress;
    type Target = ShippingAddressResource;

    const NAME: &'static str = "ShippingAddressToResource";

    fn rules() -> &'static [FieldRule<ShippingAddress, ShippingAddressResource>] {
        const RULES: &[FieldRule<ShippingAddress, ShippingAddressResource>] = &[
            FieldRule::new(
                &[
                    "id",
                    "title",
                    "first_name",
                    "last_name",
                    "line1",
                    "line2",
                    "line3",
                    "line4",
                    "state",
                    "postcode",
                    "phone_number",
                    "notes",
                ],
                ShippingAddressToResource::copy_fields,
            ),
            FieldRule::new(&["country"], ShippingAddressToResource::country),
        ];
        RULES
    }

    fn identify(address: &ShippingAddress) -> String {
        format!("ShippingAddress(id={:?})", address.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappings::common::map_source;

    fn netherlands() -> Country {
        Country {
            iso_3166_1_a2: "NL".to_string(),
            iso_3166_1_a3: "NLD".to_string(),
            iso_3166_1_numeric: "528".to_string(),
            printable_name: "Netherlands".to_string(),
            name: "Kingdom of the Netherlands".to_string(),
            is_shipping_country: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_billing_address_uses_joined_country() {
        let db = Database::new();
        let address = BillingAddress {
            id: Some(1),
            first_name: "Jan".to_string(),
            line1: "Keizersgracht 1".to_string(),
            postcode: "1015 CJ".to_string(),
            country: Related::Loaded(netherlands()),
            ..Default::default()
        };

        let context = MappingContext::new(&db);
        let resource = BillingAddressToResource::apply(&address, &context).unwrap();
        assert_eq!(resource.line1, "Keizersgracht 1");
        assert_eq!(resource.country.iso_3166_1_a2, "NL");
        assert_eq!(db.query_count(), 0);
    }

    #[test]
    fn test_shipping_addresses_load_country_by_id() {
        let db = Database::new();
        let country = db.insert(netherlands()).unwrap();
        let addresses = vec![
            ShippingAddress {
                id: Some(1),
                country_id: country.id.unwrap(),
                notes: "Ring twice".to_string(),
                ..Default::default()
            },
            ShippingAddress {
                id: Some(2),
                country_id: 99,
                ..Default::default()
            },
        ];

        let context = MappingContext::new(&db);
        let first = map_source::<ShippingAddressToResource, _>(&addresses[0], &context).unwrap();
        assert_eq!(first.notes, "Ring twice");
        assert_eq!(first.country.printable_name, "Netherlands");

        let error = map_source::<ShippingAddressToResource, _>(&addresses, &context).unwrap_err();
        assert_eq!(error.field(), Some("country"));
    }
}
